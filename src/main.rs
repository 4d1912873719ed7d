use anyhow::{Context, Result};
use filter_dispatcher::{FilterParser, OrderByParser, ParserConfig};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const HELP: &str = "\
commands:
  filter <text>   parse a filter, e.g. filter name eq 'bob' and age gt 21
  order <text>    parse an order by, e.g. order name desc, age
  tokens <text>   show the raw tokens of a filter
  help            show this message
  quit            exit";

fn init_logging(verbosity: usize) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// 加载命令行指定的配置文件，没有则使用内置演示配置
fn load_config(path: Option<&str>) -> Result<ParserConfig> {
    match path {
        Some(path) => ParserConfig::from_json_file(path)
            .with_context(|| format!("loading parser config from {}", path)),
        None => {
            log::info!("no config file given, using the demo registry");
            Ok(ParserConfig::demo())
        }
    }
}

fn run_filter(parser: &FilterParser, text: &str) {
    match parser.parse(text) {
        Ok(Some(result)) => {
            println!("{}", result.filter_text());
            for (i, arg) in result.args().iter().enumerate() {
                println!("  @{} = {:?}", i, arg);
            }
        }
        Ok(None) => println!("(empty filter)"),
        Err(e) => println!("error: {}", e),
    }
}

fn run_order(parser: &OrderByParser, text: &str) {
    match parser.parse_or_default(text) {
        Ok(Some(rendered)) => println!("{}", rendered),
        Ok(None) => println!("(no ordering)"),
        Err(e) => println!("error: {}", e),
    }
}

fn run_tokens(parser: &FilterParser, text: &str) {
    for token in parser.tokens(text) {
        match token {
            Ok(token) => println!(
                "  {:>3}..{:<3} {:?} {}",
                token.span.start,
                token.span.end,
                token.kind,
                token.text(text)
            ),
            Err(e) => {
                println!("error: {}", e);
                break;
            }
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let verbosity = args
        .iter()
        .filter(|a| a.starts_with("-v"))
        .map(|a| a.chars().filter(|c| *c == 'v').count())
        .sum();
    init_logging(verbosity);

    let config = load_config(args.iter().find(|a| !a.starts_with('-')).map(String::as_str))?;
    let filters = config.build_filter_parser()?;
    let order = config.build_order_by_parser()?;

    println!("--- filter dispatcher ---");
    println!("{}", HELP);

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
                match command {
                    "filter" => run_filter(&filters, rest),
                    "order" => run_order(&order, rest),
                    "tokens" => run_tokens(&filters, rest),
                    "help" => println!("{}", HELP),
                    "quit" | "exit" => break,
                    other => println!("unknown command '{}', try 'help'", other),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
