//! stencil CLI entry point.

mod cli;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};
use stencil::diagnostics::print_compile_errors;
use stencil::{Error, Project, RenderOptions, parse_entry, read_dist, render_dist, write_dist};
use stencil_bundle::{ModuleUnificationDelegate, generate_data_segment};
use stencil_core::Value;
use stencil_core::bytecode::disassemble;
use stencil_runtime::ResolverMap;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Compile {
            project,
            main,
            out_dir,
            module,
        } => compile(&project, &main, &out_dir, module),
        Command::Render {
            dist,
            main,
            resolver_map,
            state,
        } => render(&dist, &main, resolver_map.as_deref(), state.as_deref()).await,
        Command::Disasm { dist } => disasm(&dist),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn compile(root: &Path, main: &str, out_dir: &Path, module: bool) -> Result<(), Error> {
    let project = Project::load(root, main)?;
    let bundle = match project.compile() {
        Ok(bundle) => bundle,
        Err(err) => {
            if let Some(errors) = err.compile_errors() {
                print_compile_errors(&project, errors);
            }
            return Err(err.into());
        }
    };
    let data = generate_data_segment(&bundle.table);
    write_dist(out_dir, &bundle.heap, &data, module)?;
    println!(
        "Compiled {} templates into {}",
        project.templates().len(),
        out_dir.display()
    );
    Ok(())
}

async fn render(
    dist: &Path,
    main: &str,
    resolver_map: Option<&Path>,
    state: Option<&Path>,
) -> Result<(), Error> {
    let delegate = ModuleUnificationDelegate::new(main);
    let mut options = RenderOptions::new(parse_entry(main, &delegate));
    if let Some(path) = resolver_map {
        let json = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        options.resolver_map = ResolverMap::from_json(&json)?;
    }
    if let Some(path) = state {
        let json = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let state: serde_json::Value = serde_json::from_str(&json)?;
        options.state = Some(Value::from(state));
    }
    let html = render_dist(dist, options).await?;
    println!("{html}");
    Ok(())
}

fn disasm(dist: &Path) -> Result<(), Error> {
    let (heap, data) = read_dist(dist)?;
    for descriptor in &data.table {
        let Some(handle) = descriptor.metadata.handle else {
            continue;
        };
        println!("{} ({}):", descriptor.metadata.name, descriptor.locator);
        match heap.slice(handle).map(disassemble) {
            Some(Ok(listing)) => print!("{listing}"),
            Some(Err(e)) => println!("  <malformed: {e}>"),
            None => println!("  <outside the heap>"),
        }
        println!();
    }
    Ok(())
}
