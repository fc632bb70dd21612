use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, NdArray},
    prelude::*,
    tensor::Distribution,
};
use clap::{Parser, ValueEnum};
use lumnet_burn::{encoder::vgg::VggConfigPreset, LumNetConfig};

type B = NdArray<f32>;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backbone {
    Vgg16,
    Vgg16Bn,
}

#[derive(Parser, Debug)]
#[command(name = "lumnet")]
#[command(about = "Build LUMNet and run one forward pass on random inputs")]
struct Cli {
    /// Batch size of the random inputs
    #[arg(short, long, default_value_t = 1)]
    batch: usize,

    /// Height and width of the random inputs, a multiple of 16
    #[arg(short, long, default_value_t = 256)]
    size: usize,

    #[arg(long, value_enum, default_value_t = Backbone::Vgg16Bn)]
    backbone: Backbone,

    /// Load ImageNet weights into the backbone
    #[arg(long)]
    pretrained: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumnet_burn=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config: LumNetConfig<VggConfigPreset> = match cli.backbone {
        Backbone::Vgg16 => LumNetConfig::vgg16(cli.pretrained),
        Backbone::Vgg16Bn => LumNetConfig::vgg16_bn(cli.pretrained),
    };

    let device = NdArrayDevice::default();
    let model = config.init::<B>(&device)?;
    println!("{model}");

    let image = Tensor::<B, 4>::random(
        [cli.batch, 3, cli.size, cli.size],
        Distribution::Normal(0.0, 1.0),
        &device,
    );
    let guide = Tensor::<B, 4>::random(
        [cli.batch, 1, cli.size, cli.size],
        Distribution::Normal(0.0, 1.0),
        &device,
    );

    let output = model.forward(image, guide)?;
    println!("output shape: {:?}", output.dims());

    Ok(())
}
