use burn_shufflenet::prelude::*;
use std::path::PathBuf;

pub const HELP: &str = "\
Burn ShuffleNetV2 Example

Builds a ShuffleNetV2 classifier and runs it on a batch of blank 224x224 images.

USAGE:
    classify [OPTIONS]

FLAGS:
    -h, --help                  Show this help message and exit

OPTIONS:
    -v, --variant <NAME>        Named variant: wd2, w1, w3d2 or w2 (default: w1)
    -w, --width-scale <SCALE>   Custom width multiplier, overrides --variant
    -c, --classes <N>           Number of output classes (default: 1000)
        --use-se                Gate every unit with squeeze-and-excitation
        --use-residual          Add residual connections to regular units
    -p, --pretrained            Load pretrained weights for the variant
    -s, --store <PATH>          Weight store directory (default: $SHUFFLENET_MODEL_STORE or ~/.burn/models)
    -b, --batch <N>             Batch size (default: 1)
";

#[derive(Debug)]
pub struct AppArgs {
    pub variant: ShuffleNetV2Variant,
    pub width_scale: Option<f64>,
    pub classes: usize,
    pub use_se: bool,
    pub use_residual: bool,
    pub pretrained: bool,
    pub store: Option<PathBuf>,
    pub batch: usize,
}

impl AppArgs {
    pub fn parse() -> Result<Self, pico_args::Error> {
        let mut pargs = pico_args::Arguments::from_env();

        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            println!("{}", HELP);
            std::process::exit(0);
        }

        let args = AppArgs {
            variant: pargs
                .opt_value_from_str(["-v", "--variant"])?
                .unwrap_or(ShuffleNetV2Variant::W1),
            width_scale: pargs.opt_value_from_str(["-w", "--width-scale"])?,
            classes: pargs.opt_value_from_str(["-c", "--classes"])?.unwrap_or(1000),
            store: pargs.opt_value_from_os_str(["-s", "--store"], parse_path)?,
            batch: pargs.opt_value_from_str(["-b", "--batch"])?.unwrap_or(1),
            // must parse flags after values
            use_se: pargs.contains("--use-se"),
            use_residual: pargs.contains("--use-residual"),
            pretrained: pargs.contains(["-p", "--pretrained"]),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            panic!("unused arguments: {remaining:?}");
        }

        Ok(args)
    }

    pub fn model_config(&self) -> WidthScaledConfig {
        let config = match self.width_scale {
            Some(width_scale) => WidthScaledConfig::new(width_scale),
            None => self.variant.config(),
        };
        config
            .with_classes(self.classes)
            .with_use_se(self.use_se)
            .with_use_residual(self.use_residual)
            .with_pretrained(self.pretrained)
    }

    pub fn weight_store(&self) -> Result<FileWeightStore, ShuffleNetError> {
        match &self.store {
            Some(path) => Ok(FileWeightStore::new(path)),
            None => FileWeightStore::from_env(),
        }
    }
}

fn parse_path(s: &std::ffi::OsStr) -> Result<PathBuf, &'static str> {
    Ok(s.into())
}
