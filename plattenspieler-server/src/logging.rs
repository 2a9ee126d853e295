use colored::{Color, ColoredString, Colorize};
use log::Level;

/// The workspace crates and the label they log under.
const LOCAL_TARGETS: [(&str, &str, Color); 2] = [
    ("plattenspieler_core", "core", Color::Cyan),
    ("plattenspieler_server", "server", Color::Green),
];

pub fn init_logger() {
    fern::Dispatch::new()
        .format(|out, message, record| {
            let time = chrono::Local::now().format("%d.%m. %H:%M:%S");

            let origin = match local_label(record.target()) {
                Some((label, color)) => label.color(color).bold(),
                None => crate_of(record.target()).dimmed(),
            };

            out.finish(format_args!(
                "{} {:>5} [{}] {}",
                time.to_string().dimmed(),
                paint_level(record.level()),
                origin,
                message
            ))
        })
        .filter(|meta| {
            // Dependencies only get through with warnings and errors
            let ceiling = match local_label(meta.target()) {
                Some(_) => Level::Info,
                None => Level::Warn,
            };

            meta.level() <= ceiling
        })
        .chain(std::io::stdout())
        .apply()
        .expect("logging is initialized")
}

fn crate_of(target: &str) -> &str {
    target.split("::").next().unwrap_or(target)
}

fn local_label(target: &str) -> Option<(&'static str, Color)> {
    LOCAL_TARGETS
        .iter()
        .find(|(name, _, _)| crate_of(target) == *name)
        .map(|(_, label, color)| (*label, *color))
}

fn paint_level(level: Level) -> ColoredString {
    match level {
        Level::Error => "error".red().bold(),
        Level::Warn => "warn".yellow().bold(),
        Level::Info => "info".blue(),
        Level::Debug => "debug".magenta(),
        Level::Trace => "trace".normal(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_local_targets_are_labeled() {
        let (label, _) = local_label("plattenspieler_core::spotify::connect").expect("is local");
        assert_eq!(label, "core");

        let (label, _) = local_label("plattenspieler_server").expect("is local");
        assert_eq!(label, "server");

        assert!(local_label("hyper::proto").is_none());
    }

    #[test]
    fn test_crate_of_strips_module_path() {
        assert_eq!(crate_of("reqwest::connect::verbose"), "reqwest");
        assert_eq!(crate_of("plattenspieler_server"), "plattenspieler_server");
    }
}
