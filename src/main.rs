use four_stage_model::{Reporter, TransportModel};
use env_logger;


fn main() {
    env_logger::init();
    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: four_stage_model <config.yaml>");
            std::process::exit(2);
        }
    };

    let model = match TransportModel::from_cfg(&config_path) {
        Ok(model) => model,
        Err(err) => {
            log::error!("failed to set up the model: {}", err);
            std::process::exit(1);
        }
    };

    let reporter = match &model.config().output_dir {
        Some(out_dir) => match Reporter::spawn(&out_dir.join("reports")) {
            Ok(reporter) => Some(reporter),
            Err(err) => {
                log::warn!("reports disabled: {}", err);
                None
            }
        },
        None => None,
    };

    let result = model.run(reporter.as_ref());
    if let Some(reporter) = reporter {
        let num_written = reporter.finish();
        log::info!("wrote {} reports", num_written);
    }

    match result {
        Ok(run) => {
            for (name, scenario) in &run.scenarios {
                match scenario {
                    Ok(scenario) => {
                        println!("{}", name);
                        for (mode, share) in &scenario.modal_split {
                            println!("  {:10} {:6.2}%", mode, share * 100.);
                        }
                    }
                    Err(err) => println!("{}: failed ({})", name, err),
                }
            }
            if run.num_failed() > 0 {
                std::process::exit(1);
            }
        }
        Err(err) => {
            log::error!("model run failed: {}", err);
            std::process::exit(1);
        }
    }
}
