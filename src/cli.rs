//! Command-line interface for the stencil compiler.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stencil")]
#[command(about = "Template bundle compiler and renderer", long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile a project's templates into a heap and data segment
    Compile {
        /// Project root containing src/ui/components
        project: PathBuf,
        /// Entry component
        #[arg(long, default_value = "Main")]
        main: String,
        #[arg(long, default_value = "dist")]
        out_dir: PathBuf,
        /// Write the data segment as an ES module (data.js)
        #[arg(long)]
        module: bool,
    },
    /// Boot an application from a dist directory and print the HTML
    Render {
        dist: PathBuf,
        /// Component name or `module#export` locator of the main template
        #[arg(long)]
        main: String,
        /// Resolver map JSON; defaults to the module-unification layout
        #[arg(long)]
        resolver_map: Option<PathBuf>,
        /// JSON used as `this` of the main template
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Print the disassembly of every template in a dist directory
    #[command(alias = "dis")]
    Disasm { dist: PathBuf },
}
