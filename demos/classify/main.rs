use burn::backend::NdArray;
use burn::prelude::*;
use burn_shufflenet::prelude::*;

mod cli;

type MainBackend = NdArray<f32>;

fn run(args: &cli::AppArgs) -> Result<(), ShuffleNetError> {
    let device = Default::default();
    let config = args.model_config();
    let net: ShuffleNetV2<MainBackend> = if config.pretrained {
        config.init_with_store(&args.weight_store()?, &device)?
    } else {
        config.init(&device)?
    };

    println!(
        "width scale {}: {} learnable parameters, stage channels {:?}, final block {}",
        config.width_scale,
        net.learnable_params(),
        net.stage_channels().iter().map(|stage| stage[0]).collect::<Vec<_>>(),
        net.final_block_channels(),
    );

    let x = Tensor::<MainBackend, 4>::zeros([args.batch, net.in_channels(), 224, 224], &device);
    let logits = net.try_forward(x)?;
    let [batch, classes] = logits.dims();
    println!("output shape: [{batch}, {classes}]");

    let top = logits.argmax(1).into_data().to_vec::<i64>().unwrap_or_default();
    println!("top classes: {top:?}");
    Ok(())
}

fn main() {
    env_logger::init();

    let args = match cli::AppArgs::parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err}\n\n{}", cli::HELP);
            std::process::exit(2);
        }
    };
    log::debug!("{args:?}");

    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
