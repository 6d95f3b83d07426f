use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use slog::{debug, o, Drain, Level, Logger};
use vexpr::{CodeGenerator, GlobalVar, SelectorParser};

/// Compile visualization expressions and event selectors
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// log parser and compiler activity to stderr
    #[clap(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and compile an expression, printing code, globals and fields
    Expr {
        expression: String,

        /// identifiers emitted verbatim
        #[clap(long, value_delimiter = ',')]
        whitelist: Vec<String>,

        /// identifiers rejected at compile time
        #[clap(long, value_delimiter = ',')]
        blacklist: Vec<String>,

        /// root whose member reads are reported as fields
        #[clap(long)]
        fieldvar: Option<String>,

        /// object that free identifiers are read from
        #[clap(long, default_value = "global")]
        globalvar: String,

        /// start with an empty constant and function table
        #[clap(long)]
        no_defaults: bool,

        /// print the parsed syntax tree as JSON instead of compiling it
        #[clap(long)]
        ast: bool,
    },
    /// Parse an event selector into stream descriptors
    Selector {
        selector: String,

        /// source for streams that do not name one
        #[clap(long, default_value = vexpr::selector::DEFAULT_SOURCE)]
        source: String,

        /// names recognised as mark types
        #[clap(long, value_delimiter = ',')]
        marks: Vec<String>,
    },
}

fn logger(verbose: bool) -> Logger {
    let level = if verbose { Level::Debug } else { Level::Info };
    let plain = slog_term::PlainSyncDecorator::new(std::io::stderr());
    Logger::root(
        slog_term::FullFormat::new(plain)
            .build()
            .filter_level(level)
            .fuse(),
        o!(),
    )
}

pub fn main() -> Result<()> {
    let args = Args::parse();
    let logger = logger(args.verbose);

    let json = match args.command {
        Command::Expr {
            expression,
            whitelist,
            blacklist,
            fieldvar,
            globalvar,
            no_defaults,
            ast,
        } => {
            let parsed = vexpr::parse(&expression)?;
            debug!(logger, "parsed expression"; "root" => parsed.kind());

            if ast {
                serde_json::to_string_pretty(&parsed).into_diagnostic()?
            } else {
                let mut builder = CodeGenerator::builder()
                    .whitelist(whitelist)
                    .blacklist(blacklist)
                    .globalvar(GlobalVar::Named(globalvar))
                    .logger(logger.new(o!("stage" => "codegen")));
                if let Some(fieldvar) = fieldvar {
                    builder = builder.fieldvar(fieldvar);
                }
                if no_defaults {
                    builder = builder.no_defaults();
                }

                let output = builder.build().compile(&parsed)?;
                serde_json::to_string_pretty(&output).into_diagnostic()?
            }
        }
        Command::Selector {
            selector,
            source,
            marks,
        } => {
            let mut parser = SelectorParser::new()
                .source(source)
                .logger(logger.new(o!("stage" => "selector")));
            if !marks.is_empty() {
                parser = parser.marks(marks);
            }

            let streams = parser.parse(&selector)?;
            serde_json::to_string_pretty(&streams).into_diagnostic()?
        }
    };

    println!("{}", json);
    Ok(())
}
