use std::{error::Error, path::Path};

use facerec::{Algorithms, Database, FsImageSource, TrainingConfig};

const USAGE: &str = "usage: facerec-example <train|recognize> <image-dir> <manifest> <data> [pca,lda,ica]";

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("wgpu", log::LevelFilter::Off)
        .filter_module("naga", log::LevelFilter::Off)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }
    let (command, images, manifest, data) = (
        args[0].as_str(),
        Path::new(&args[1]),
        Path::new(&args[2]),
        Path::new(&args[3]),
    );
    // Only PCA is built in; LDA and ICA need their layers supplied by a library caller
    let algorithms = args
        .get(4)
        .map(|names| Algorithms::from_names(names.split(',')))
        .unwrap_or_default();
    let config = TrainingConfig::new().with_algorithms(algorithms);
    let source = FsImageSource::new();

    let start_time = std::time::Instant::now();
    match command {
        "train" => {
            let mut db = Database::new(config);
            db.train(&source, images)?;
            db.save(manifest, data)?;
            println!(
                "Trained {} images in {} classes",
                db.num_images(),
                db.num_classes()
            );
        }
        "recognize" => {
            let db = Database::load(manifest, data, config)?;
            let report = db.recognize(&source, images)?;
            println!("{}", report.to_json()?);
        }
        other => {
            eprintln!("unknown command '{other}'\n{USAGE}");
            std::process::exit(2);
        }
    }
    println!("Elapsed time: {:?}", start_time.elapsed());

    #[cfg(feature = "gpu")]
    {
        use facerec::human_size;
        let ts = facerec_core::GpuDevice::shared()?.get_transfer_stats();
        log::info!("Bytes transferred To GPU: {}", human_size(ts.bytes_to_gpu));
        log::info!(
            "Bytes transferred From GPU: {}",
            human_size(ts.bytes_from_gpu)
        );
    }
    Ok(())
}
