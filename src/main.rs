use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;

use divipdf_api::{configure, AppState, Config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    log::info!("🦀 Starting DiviPDF conversion service");
    log::info!("📍 Listening on {}:{}", config.host, config.port);
    log::info!(
        "📂 Uploads: {}, outputs: {}",
        config.upload_dir.display(),
        config.output_dir.display()
    );
    log::info!(
        "🔧 JPEG quality {}, status codes {:?}, retain files {}",
        config.jpeg_quality,
        config.status_codes,
        config.retain_files
    );

    let state = web::Data::new(AppState::new(&config));
    state.storage.ensure_dirs().await?;

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
