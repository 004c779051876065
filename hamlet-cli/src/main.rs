//! Command-line interface for hamlet
//!
//! Usage:
//!   hamlet render `<path>` [--context `<file>`] [--local `<key=json>`]...   - Render a template
//!   hamlet compile `<path>`                                              - Print the generated procedure
//!   hamlet ir `<path>` [--raw]                                           - Print the IR as an s-expression
//!
//! Every command accepts `--config <file>` (layered over the built-in defaults and an
//! optional `hamlet.toml` in the working directory) and repeated `--set key=value`
//! overrides of compiler options. `RUST_LOG=hamlet=debug` traces the pipeline on stderr.

use clap::{Arg, ArgAction, ArgMatches, Command};
use hamlet::TemplateLoader;
use hamlet_config::{ContextFormat, HamletConfig, Loader};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let template_arg = || {
        Arg::new("path")
            .help("Path to the template file")
            .required(true)
            .index(1)
    };
    let matches = Command::new("hamlet")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile and render Haml-style templates")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("Configuration file layered over the defaults"),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .global(true)
                .action(ArgAction::Append)
                .value_name("KEY=VALUE")
                .help("Override a compiler option (e.g. format=xhtml)"),
        )
        .subcommand(
            Command::new("render")
                .about("Render a template to HTML")
                .arg(template_arg())
                .arg(
                    Arg::new("context")
                        .long("context")
                        .help("JSON or YAML file with the data read through @field"),
                )
                .arg(
                    Arg::new("local")
                        .long("local")
                        .short('l')
                        .action(ArgAction::Append)
                        .value_name("KEY=JSON")
                        .help("Bind a local variable (value parsed as JSON, else a string)"),
                ),
        )
        .subcommand(
            Command::new("compile")
                .about("Print the generated template procedure")
                .arg(template_arg()),
        )
        .subcommand(
            Command::new("ir")
                .about("Print the template IR")
                .arg(template_arg())
                .arg(
                    Arg::new("raw")
                        .long("raw")
                        .action(ArgAction::SetTrue)
                        .help("Show parser output before any pass ran"),
                ),
        )
        .get_matches();

    let config = load_config(&matches);
    match matches.subcommand() {
        Some(("render", sub)) => handle_render_command(&config, sub),
        Some(("compile", sub)) => handle_compile_command(&config, sub),
        Some(("ir", sub)) => handle_ir_command(&config, sub),
        _ => {
            eprintln!("Missing command, see --help");
            std::process::exit(2);
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn load_config(matches: &ArgMatches) -> HamletConfig {
    let mut loader = Loader::new().with_optional_file("hamlet.toml");
    if let Some(path) = matches.get_one::<String>("config") {
        loader = loader.with_file(path);
    }
    for setting in matches.get_many::<String>("set").into_iter().flatten() {
        let Some((key, value)) = setting.split_once('=') else {
            fail(format!("Invalid --set '{}', expected KEY=VALUE", setting));
        };
        let key = if key.contains('.') {
            key.to_string()
        } else {
            format!("compiler.{}", key)
        };
        loader = loader
            .set_override(&key, value)
            .unwrap_or_else(|e| fail(format!("Invalid --set '{}': {}", setting, e)));
    }
    loader
        .build()
        .unwrap_or_else(|e| fail(format!("Configuration error: {}", e)))
}

fn template_loader(sub: &ArgMatches) -> TemplateLoader {
    let path = sub
        .get_one::<String>("path")
        .expect("path is a required argument");
    TemplateLoader::from_path(path).unwrap_or_else(|e| fail(e))
}

/// Handle the render command
fn handle_render_command(config: &HamletConfig, sub: &ArgMatches) {
    let template = template_loader(sub)
        .compile(&config.compiler)
        .unwrap_or_else(|e| fail(e));

    let context = match sub.get_one::<String>("context") {
        Some(path) => read_context(Path::new(path), config.render.context_format),
        None => Value::Object(Map::new()),
    };

    let mut locals = Map::new();
    for binding in sub.get_many::<String>("local").into_iter().flatten() {
        let Some((name, raw)) = binding.split_once('=') else {
            fail(format!("Invalid --local '{}', expected KEY=JSON", binding));
        };
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        locals.insert(name.to_string(), value);
    }

    let html = template
        .render(&context, &locals)
        .unwrap_or_else(|e| fail(format!("Render error: {}", e)));
    print!("{}", html);
}

/// Handle the compile command
fn handle_compile_command(config: &HamletConfig, sub: &ArgMatches) {
    let template = template_loader(sub)
        .compile(&config.compiler)
        .unwrap_or_else(|e| fail(e));
    println!("{}", template.source());
}

/// Handle the ir command
fn handle_ir_command(config: &HamletConfig, sub: &ArgMatches) {
    let loader = template_loader(sub);
    let ir = if sub.get_flag("raw") {
        let engine = hamlet::Engine::new(config.compiler.clone()).unwrap_or_else(|e| fail(e));
        engine.parse(loader.source()).unwrap_or_else(|e| fail(e))
    } else {
        loader.ir(&config.compiler).unwrap_or_else(|e| fail(e))
    };
    println!("{}", ir);
}

fn read_context(path: &Path, fallback: ContextFormat) -> Value {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("Cannot read {}: {}", path.display(), e)));
    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => ContextFormat::Json,
        Some("yaml") | Some("yml") => ContextFormat::Yaml,
        _ => fallback,
    };
    let parsed = match format {
        ContextFormat::Json => serde_json::from_str(&text).map_err(|e| e.to_string()),
        ContextFormat::Yaml => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
    };
    tracing::debug!(path = %path.display(), ?format, "reading render context");
    parsed.unwrap_or_else(|e| fail(format!("Invalid context {}: {}", path.display(), e)))
}
