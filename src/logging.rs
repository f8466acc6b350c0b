use anyhow::Context as _;

/// Install the stderr subscriber. `RUST_LOG` wins over the default level.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_directive(verbose)))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_lowers_default_level() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "debug");
        assert!(tracing_subscriber::EnvFilter::try_new(default_directive(true)).is_ok());
    }
}
