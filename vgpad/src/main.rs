#![warn(clippy::pedantic)]

mod session;
mod settings;

use std::path::PathBuf;

use anyhow::Result as AnyResult;
use vgpad_core::{CoreView, ShapeFactory};

const USAGE: &str = "usage: vgpad [--record <dir>] [--play <dir>] [--out <file>] [documents...]";

#[derive(Default, Debug)]
struct Args {
    /// Record a scripted session into this directory.
    record: Option<PathBuf>,
    /// Play back the recording in this directory.
    play: Option<PathBuf>,
    /// Save the played or recorded document here.
    out: Option<PathBuf>,
    /// Documents to inspect.
    documents: Vec<PathBuf>,
}
impl Args {
    fn parse() -> AnyResult<Self> {
        let mut args = std::env::args_os().skip(1);
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            let slot = match arg.to_str() {
                Some("--record") => Some(&mut parsed.record),
                Some("--play") => Some(&mut parsed.play),
                Some("--out") => Some(&mut parsed.out),
                Some("--help" | "-h") => anyhow::bail!(USAGE),
                _ => None,
            };
            let Some(slot) = slot else {
                // Paths are OSStrings, let the system handle character encoding restrictions.
                parsed.documents.push(arg.into());
                continue;
            };
            let value = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("{} needs a path\n{USAGE}", arg.to_string_lossy()))?;
            *slot = Some(value.into());
        }
        Ok(parsed)
    }
}

/// Load every document at once and log what's in them. False if none of them loaded.
fn inspect(paths: Vec<PathBuf>, settings: &vgpad_core::CoreSettings) -> bool {
    use rayon::iter::{IntoParallelIterator, ParallelIterator};
    // No paths is a success.
    let had_success: std::sync::atomic::AtomicBool = paths.is_empty().into();
    paths.into_par_iter().for_each(|path| {
        let view = CoreView::new(ShapeFactory::default(), settings.clone());
        if !view.load_from_file(&path, true) {
            log::error!("failed to open file {}", path.display());
            return;
        }
        had_success.store(true, std::sync::atomic::Ordering::Relaxed);

        let doc = view.front_doc();
        let mut kinds = std::collections::BTreeMap::<&str, usize>::new();
        for shape in doc.iter() {
            *kinds.entry(shape.type_name()).or_default() += 1;
        }
        let extent = doc.bounding_box();
        if extent.is_null() {
            log::info!("{}: empty", path.display());
        } else {
            log::info!(
                "{}: {} shapes {kinds:?}, extent {:?}",
                path.display(),
                doc.shape_count(),
                extent.to_ltrb(),
            );
        }
    });
    had_success.into_inner()
}

fn main() -> AnyResult<()> {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        let _ = simple_logging::log_to_file("log.out", log::LevelFilter::Debug);
    }

    let args = Args::parse()?;
    let settings = settings::Settings::get();
    if settings.did_fail_to_load() {
        if let Err(e) = settings.save() {
            log::warn!("Failed to save default settings:\n{e:?}");
        }
    }

    if !inspect(args.documents, &settings.core) {
        log::warn!("Failed to load any provided document.");
    }

    let view = CoreView::new(ShapeFactory::default(), settings.core.clone());
    if let Some(dir) = &args.record {
        let frames = session::record_demo(&view, dir)?;
        log::info!("recorded {frames} frames into {}", dir.display());
    }
    if let Some(dir) = &args.play {
        let speed = settings.core.playback_speed;
        let frames = session::play(&view, dir, speed)?;
        log::info!(
            "played {frames} frames from {}, {} shapes over {} draws",
            dir.display(),
            view.get_shape_count(),
            view.get_draw_count(),
        );
    }
    if let Some(out) = &args.out {
        anyhow::ensure!(
            view.save_to_file(out, settings.core.pretty_json),
            "failed to save {}",
            out.display()
        );
    }
    Ok(())
}
