use custody_lp::LocalCustody;
use log::info;

fn main() {
    env_logger::init();

    let (_, generated) = LocalCustody::generate();
    info!("Generated wallet {:?}", generated.address);

    match serde_json::to_string_pretty(&generated) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
