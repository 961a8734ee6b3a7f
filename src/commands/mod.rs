pub mod resolve;
pub mod sync;

use anyhow::Result;

use crate::bundle::Bundle;
use crate::cli::BundleArgs;
use crate::config::Settings;

/// Load settings and the bundle they apply to. A target given on the
/// command line wins over the one in the settings file.
fn load_bundle(args: &BundleArgs) -> Result<(Settings, Bundle)> {
    let settings = Settings::discover(args.config.as_deref(), &args.root)?;
    let target = args.target.as_deref().or(settings.target.as_deref());
    let bundle = Bundle::load(&args.root, target)?;
    log::info!(
        "Loaded {} file(s) from {}",
        bundle.files.len(),
        bundle.dir.display()
    );
    Ok((settings, bundle))
}
