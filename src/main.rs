use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use storyedit::config::{load_editor_config, load_editor_config_from};
use storyedit::storage::{FileExportSink, SessionSink};

/// Flattens speech bubbles onto an image without opening the editor.
#[derive(Parser)]
#[command(name = "storyedit", about = "Flatten speech bubbles onto an image", version)]
struct Args {
    /// Source image (PNG, JPEG, WebP).
    input: PathBuf,
    /// JSON array of bubble descriptions.
    bubbles: PathBuf,
    /// Where to write the PNG; defaults to the configured export directory.
    output: Option<PathBuf>,
    /// Read settings from this file instead of the XDG config location.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Font for bubble text, overriding `font_path` from the config.
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    storyedit::logging::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_editor_config_from(path),
        None => load_editor_config(),
    };
    if let Some(font) = args.font {
        config.font_path = Some(font);
    }

    let image = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let bubbles_json = std::fs::read_to_string(&args.bubbles)
        .with_context(|| format!("failed to read {}", args.bubbles.display()))?;
    let bubbles = storyedit::parse_bubbles(&bubbles_json)?;

    let exported = storyedit::flatten_with_bubbles(
        &image,
        storyedit::mime_type_for_path(&args.input),
        &bubbles,
        &config,
    )?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &exported.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "flattened image written");
        }
        None => {
            let mut sink = FileExportSink::from_config(&config)
                .context("no output path given and no export_dir configured")?;
            sink.on_session_complete(exported)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn output_and_overrides_are_optional() {
        let args = Args::try_parse_from(["storyedit", "page.png", "bubbles.json"])
            .expect("two positionals parse");
        assert_eq!(args.input, PathBuf::from("page.png"));
        assert!(args.output.is_none());
        assert!(args.font.is_none());

        let args = Args::try_parse_from([
            "storyedit",
            "page.png",
            "bubbles.json",
            "out.png",
            "--font",
            "/fonts/comic.ttf",
        ])
        .expect("full form parses");
        assert_eq!(args.output, Some(PathBuf::from("out.png")));
        assert_eq!(args.font, Some(PathBuf::from("/fonts/comic.ttf")));
    }

    #[test]
    fn bubbles_file_is_required() {
        assert!(Args::try_parse_from(["storyedit", "page.png"]).is_err());
    }
}
