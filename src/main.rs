use anyhow::{Context, Result, bail};
use clap::Parser;
use pacsview::cli::Args;
use pacsview::config::{AdjustmentScope, ViewerConfig};
use pacsview::dicom::synthetic::phantom_series;
use pacsview::display::{self, TerminalSize};
use pacsview::study::{DirectorySource, MemorySource, StudySource};
use pacsview::viewer::{Session, Viewer};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_STUDY_ID: &str = "DEMO";
const DEMO_SLICE_SIZE: u16 = 128;

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(&args) {
        println!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> Result<ViewerConfig> {
    let mut config = match (&args.config, &args.profile) {
        (Some(path), _) => ViewerConfig::from_file(path)?,
        (None, Some(name)) => {
            ViewerConfig::profile(name).with_context(|| format!("Unknown profile `{name}`"))?
        }
        (None, None) => ViewerConfig::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

fn demo_source(slices: usize) -> Result<MemorySource> {
    let mut source = MemorySource::new(DEMO_STUDY_ID);
    {
        let descriptor = source.descriptor_mut();
        descriptor.patient_name = Some("PHANTOM^DEMO".to_string());
        descriptor.patient_age = Some("40".to_string());
        descriptor.patient_gender = Some("O".to_string());
        descriptor.modality = Some("CT".to_string());
        descriptor.status = Some("demo".to_string());
    }
    for (i, bytes) in phantom_series(DEMO_SLICE_SIZE, DEMO_SLICE_SIZE, slices.max(1))?
        .into_iter()
        .enumerate()
    {
        source.add_file(&format!("phantom-{:03}.dcm", i + 1), bytes);
    }
    Ok(source)
}

/// Source and study id for the requested study
fn open_source(args: &Args) -> Result<(Arc<dyn StudySource>, String)> {
    if let Some(slices) = args.demo {
        let source: Arc<dyn StudySource> = Arc::new(demo_source(slices)?);
        return Ok((source, DEMO_STUDY_ID.to_string()));
    }
    let Some(dir) = args.study.as_deref() else {
        bail!("No study directory given");
    };
    let source: Arc<dyn StudySource> = Arc::new(DirectorySource::new(dir));
    Ok((source, study_id_for(dir)))
}

fn study_id_for(dir: &Path) -> String {
    dir.file_name()
        .map_or_else(|| dir.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Apply the view flags to every viewport
fn configure_viewer(viewer: &mut Viewer, args: &Args) -> Result<()> {
    let layout = viewer.select_layout(&args.layout);
    if !viewer.set_render_mode(args.mode) {
        bail!("Render mode {} is disabled by the configuration", args.mode);
    }

    let shared = viewer.config().adjustment_scope == AdjustmentScope::Shared;
    for index in 0..viewer.viewports().len() {
        viewer.set_active_viewport(index);
        if index == 0 || !shared {
            if let Some(preset) = args.preset {
                viewer.apply_preset(preset);
            }
            if let Some((center, width)) = args.window {
                viewer.set_window(center, width);
            }
            if args.invert {
                viewer.toggle_invert();
            }
        }
        if let Some(zoom) = args.zoom {
            viewer.set_zoom(zoom);
        }
        if let Some(degrees) = args.rotate {
            viewer.rotate_by(degrees);
        }
        if args.flip_h {
            viewer.flip_horizontal();
        }
        if args.flip_v {
            viewer.flip_vertical();
        }
        if let Some(slice) = args.slice {
            viewer.set_slice(slice.saturating_sub(1));
        }
    }
    viewer.set_active_viewport(0);
    info!("Layout {layout}, mode {}", args.mode);
    Ok(())
}

fn render(viewer: &Viewer, args: &Args) -> Result<u32> {
    let config = viewer.config();
    let frame = viewer.render_composed(config.canvas_width, config.canvas_height);
    if frame.report.placeholders() > 0 {
        warn!("{} viewport(s) show a placeholder", frame.report.placeholders());
    }

    let size = TerminalSize {
        width: args.width,
        height: args.height,
    };
    let (_, rows) = display::print_frame(&frame.raster, size)?;
    display::print_texts(&frame.texts);

    if let Some(path) = &args.output {
        frame
            .raster
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(rows + u32::try_from(frame.texts.len()).unwrap_or(0))
}

fn play(viewer: &mut Viewer, args: &Args, seconds: f64) -> Result<()> {
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("Cine duration must be positive, got {seconds}");
    }
    let duration = Duration::from_secs_f64(seconds);
    viewer.play();
    if !viewer.is_playing() {
        warn!("Cine needs more than one slice");
        return Ok(());
    }

    let period = Duration::from_secs_f64(1.0 / viewer.config().cine_fps.clamp(0.1, 60.0));
    let started = Instant::now();
    let mut last = started;
    let mut printed = render(viewer, args)?;

    while started.elapsed() < duration {
        std::thread::sleep(period);
        let now = Instant::now();
        if viewer.tick(now - last) {
            display::rewind(printed)?;
            printed = render(viewer, args)?;
        }
        last = now;
    }
    viewer.stop();
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let (source, study_id) = open_source(args)?;

    let session = Session::new(
        std::env::var("USER").unwrap_or_else(|_| "local".to_string()),
        "viewer",
    );
    let mut viewer = Viewer::new(session, config);
    viewer
        .load(source, &study_id)
        .with_context(|| format!("Failed to load study {study_id}"))?;

    if viewer.store().usable_count() == 0 {
        bail!("None of the {} files could be decoded", viewer.store().count());
    }

    if args.verbose {
        if let Some(descriptor) = viewer.descriptor() {
            pacsview::display_metadata::print_study(descriptor, viewer.load_report());
        }
        if let Some((_, slice)) = viewer.store().iter().next() {
            pacsview::print_metadata(slice);
        }
    }

    configure_viewer(&mut viewer, args)?;

    match args.cine {
        Some(seconds) => play(&mut viewer, args, seconds),
        None => render(&viewer, args).map(|_| ()),
    }
}
