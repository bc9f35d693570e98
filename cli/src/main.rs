use std::path::PathBuf;

use apkparse::Locale;
use clap::{Parser, Subcommand};

use crate::commands::{
    command_classes, command_gzip, command_icons, command_manifest, command_meta,
    command_resource, command_signers,
};

mod commands;

#[derive(Parser)]
#[command(version, about, arg_required_else_help(true))]
struct Cli {
    /// Locale used to resolve resource references, e.g. `fr-FR`
    #[arg(short, long, global = true, default_value = "en-US")]
    locale: Locale,

    /// Show references as `@type/key` instead of resolving them
    #[arg(long, global = true, conflicts_with = "locale")]
    raw: bool,

    #[command(subcommand)]
    commands: Option<Commands>,
}

impl Cli {
    fn preferred_locale(&self) -> Option<Locale> {
        (!self.raw).then(|| self.locale.clone())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the manifest metadata of apk files
    Meta {
        /// Apk files or directories to walk
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(short, long, help = "print as json")]
        json: bool,
    },
    /// Print the decoded `AndroidManifest.xml` of an apk, or a raw binary xml file
    Manifest {
        #[arg(required = true)]
        path: PathBuf,
    },
    /// List classes of every dex file
    Classes {
        #[arg(required = true)]
        path: PathBuf,

        #[arg(short, long, help = "print as json")]
        json: bool,
    },
    /// Show v1 and v2+ signer certificates
    Signers {
        #[arg(required = true)]
        path: PathBuf,

        #[arg(short, long, help = "print as json")]
        json: bool,
    },
    /// Show every configuration of a resource id
    Resource {
        #[arg(required = true)]
        path: PathBuf,

        /// Resource id, e.g. `0x7f010000`
        #[arg(required = true, value_parser = commands::parse_resource_id)]
        id: u32,
    },
    /// List application icons, optionally writing them to a folder
    Icons {
        #[arg(required = true)]
        path: PathBuf,

        #[arg(short, long, help = "Output folder")]
        output: Option<PathBuf>,
    },
    /// Compress or decompress a gzip file
    Gzip {
        input: PathBuf,
        output: PathBuf,

        #[arg(short, long)]
        decompress: bool,

        #[arg(long, help = "decompress every member, not just the first")]
        concatenated: bool,

        #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let locale = cli.preferred_locale();

    let result = match &cli.commands {
        Some(Commands::Meta { paths, json }) => command_meta(paths, locale, *json),
        Some(Commands::Manifest { path }) => command_manifest(path, locale),
        Some(Commands::Classes { path, json }) => command_classes(path, *json),
        Some(Commands::Signers { path, json }) => command_signers(path, *json),
        Some(Commands::Resource { path, id }) => command_resource(path, *id, locale),
        Some(Commands::Icons { path, output }) => command_icons(path, output.as_deref(), locale),
        Some(Commands::Gzip {
            input,
            output,
            decompress,
            concatenated,
            level,
        }) => command_gzip(input, output, *decompress, *concatenated, *level),
        None => Ok(()),
    };

    if let Err(err) = result {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
