//! Diagnostic formatting for the stencil CLI.

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use stencil_bundle::CompileError;
use stencil_core::{CompilationPhase, Diagnostic};

use crate::project::Project;

/// Get the display color for a compilation phase.
pub fn phase_color(phase: &CompilationPhase) -> Color {
    match phase {
        CompilationPhase::Parsing => Color::Red,
        CompilationPhase::Codegen => Color::Yellow,
        CompilationPhase::Linking => Color::Magenta,
    }
}

/// Normalize a span to ensure end > start (required by ariadne).
pub fn normalize_span(start: usize, end: usize) -> (usize, usize) {
    (start, end.max(start + 1))
}

/// Print a diagnostic using ariadne for pretty output.
pub fn print_diagnostic(diag: &Diagnostic, source: &str, file_path: &str) {
    let (start, end) = normalize_span(diag.span.start, diag.span.end);
    let color = phase_color(&diag.phase);

    Report::build(ReportKind::Error, (file_path, start..end))
        .with_code(format!("{:?}", diag.phase))
        .with_message(&diag.message)
        .with_label(
            Label::new((file_path, start..end))
                .with_message(&diag.message)
                .with_color(color),
        )
        .finish()
        .eprint((file_path, Source::from(source)))
        .ok();
}

/// Render a diagnostic without colors.
pub fn format_diagnostic(diag: &Diagnostic, source: &str, file_path: &str) -> String {
    let (start, end) = normalize_span(diag.span.start, diag.span.end);
    let mut out = Vec::new();
    Report::build(ReportKind::Error, (file_path, start..end))
        .with_config(Config::default().with_color(false))
        .with_code(format!("{:?}", diag.phase))
        .with_message(&diag.message)
        .with_label(Label::new((file_path, start..end)).with_message(&diag.message))
        .finish()
        .write((file_path, Source::from(source)), &mut out)
        .ok();
    String::from_utf8_lossy(&out).into_owned()
}

/// Prints every compile error against the project source it came from.
pub fn print_compile_errors(project: &Project, errors: &[CompileError]) {
    for error in errors {
        match project.template(&error.locator) {
            Some(template) => {
                let path = template.path.display().to_string();
                print_diagnostic(&error.diagnostic, &template.source, &path);
            }
            None => eprintln!("{}", error),
        }
    }
}
