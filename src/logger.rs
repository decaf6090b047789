use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Logs of this binary go at debug level in debug mode; dependencies stay at info.
pub fn setup_logger(debug: bool, log_file: Option<&str>) -> Result<(), fern::InitError> {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };
    let color_config = ColoredLevelConfig::new()
        .info(Color::BrightGreen)
        .error(Color::BrightRed)
        .warn(Color::Yellow)
        .debug(Color::Magenta)
        .trace(Color::BrightCyan);

    let mut dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{:>5}]{}[{}] {}",
                color_config.color(record.level()),
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .level_for("server", level)
        .chain(std::io::stdout());
    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }
    dispatch.apply()?;
    Ok(())
}
