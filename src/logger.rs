use env_logger::Env;
use log::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Verbosity {
    pub fn from_u8(level: u8) -> Self {
        match level {
            0 => Verbosity::Low,
            1 => Verbosity::Medium,
            2 => Verbosity::High,
            _ => Verbosity::Low,
        }
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Low => LevelFilter::Info,
            Verbosity::Medium => LevelFilter::Debug,
            Verbosity::High => LevelFilter::Trace,
        }
    }
}

/// Installs the global logger. `RUST_LOG` wins over the configured verbosity.
pub fn init(verbosity: Verbosity) {
    let default = verbosity.level_filter().to_string().to_lowercase();
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_filters() {
        assert_eq!(Verbosity::from_u8(0).level_filter(), LevelFilter::Info);
        assert_eq!(Verbosity::from_u8(1).level_filter(), LevelFilter::Debug);
        assert_eq!(Verbosity::from_u8(2).level_filter(), LevelFilter::Trace);
        assert_eq!(Verbosity::from_u8(9), Verbosity::Low);
    }
}
