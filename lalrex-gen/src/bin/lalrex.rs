//! Command-line front-end for the LALR(1) table builder.
//!
//! `lalrex table <grammar>` prints the automaton report of a grammar file.
//! `lalrex parse <grammar> <input>` builds the grammar and parses one input
//! string, printing the tree outline or the error.

#[cfg(feature = "cli")]
mod real {
    use anyhow::Context;
    use clap::{Args, Parser, Subcommand};
    use lalrex_gen::BuildOptions;
    use std::path::PathBuf;

    #[derive(Parser)]
    #[command(about = "Build LALR(1) tables from Lark-style grammars")]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Print productions, FIRST sets, states, table and conflicts.
        Table {
            #[command(flatten)]
            build: BuildArgs,
        },
        /// Parse one input string and print the tree.
        Parse {
            #[command(flatten)]
            build: BuildArgs,

            /// Text to parse.
            input: String,
        },
    }

    #[derive(Args)]
    struct BuildArgs {
        /// Path to the grammar file.
        grammar: PathBuf,

        /// Start rule (defaults to `%start` or `start`).
        #[arg(short = 's', long)]
        start: Option<String>,

        /// Drop tokens of anonymous literals from trees.
        #[arg(long)]
        drop_tokens: bool,

        /// Fail on any LALR(1) conflict instead of resolving it.
        #[arg(long)]
        strict: bool,

        /// Log the automaton report while building.
        #[arg(short = 'd', long)]
        debug: bool,
    }

    impl BuildArgs {
        fn load(&self) -> anyhow::Result<(String, BuildOptions)> {
            let text = std::fs::read_to_string(&self.grammar)
                .with_context(|| format!("cannot read {}", self.grammar.display()))?;
            let mut options = if self.strict {
                BuildOptions::strict()
            } else {
                BuildOptions::default()
            };
            options.start = self.start.as_deref().map(Into::into);
            options.keep_all_tokens = !self.drop_tokens;
            options.debug = self.debug;
            Ok((text, options))
        }
    }

    pub fn main() -> anyhow::Result<()> {
        env_logger::init();
        match Cli::parse().command {
            Command::Table { build } => {
                let (text, options) = build.load()?;
                let mut out = std::io::stdout().lock();
                lalrex_gen::write_report(&text, &options, &mut out)
            }
            Command::Parse { build, input } => {
                let (text, options) = build.load()?;
                let table = lalrex_gen::build_with_options(&text, &options)
                    .with_context(|| format!("in grammar {}", build.grammar.display()))?;
                let tree = table.parse(&input)?;
                print!("{}", tree.pretty());
                Ok(())
            }
        }
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    real::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("lalrex disabled (compiled without `cli` feature)");
}
