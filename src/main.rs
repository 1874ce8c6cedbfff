use refacer::{
    image::Image,
    model::{register_ort, Models},
    pipeline::SwapPipeline,
    result::Result,
    setting::Setting,
    tracing::{get_subscriber, init_subscriber},
};

// refacer [source-image] [input-frame] [output-frame]
fn main() -> Result<()> {
    init_subscriber(get_subscriber("refacer", "info", std::io::stdout))?;

    // Get Setting
    let setting = Setting::get()?;
    // Register Models
    register_ort(&setting.config.model)?;
    let models = Models::new(&setting.config.model)?;
    let mut pipeline = SwapPipeline::new(models, setting.config.pipeline.clone());

    let mut args = std::env::args().skip(1);
    let source = args.next().unwrap_or_else(|| "source.png".to_owned());
    let input = args.next().unwrap_or_else(|| "input.png".to_owned());
    let output = args.next().unwrap_or_else(|| "output.png".to_owned());

    pipeline.register_source_face(Image::from_path(source.into())?)?;

    let mut frame = Image::from_path(input.into())?;
    let face_count = pipeline.process_frame(&mut frame)?;
    tracing::info!("frame processed, {face_count} face(s) detected");

    frame.save(output.into())
}
