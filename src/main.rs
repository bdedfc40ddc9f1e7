use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use format_converter::routes::{self, UploadLimit};
use format_converter::{DocumentConverter, ServerConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    log::info!("🦀 Starting Format Converter Service");
    log::info!("📍 Listening on {}:{}", config.host, config.port);
    log::info!("🖨️  PDF renderer: {} (timeout {:?})", config.chrome_path.display(), config.render_timeout);
    log::info!("📦 Max upload size: {} bytes", config.max_upload_bytes);

    let converter = web::Data::new(DocumentConverter::new(&config));
    let upload_limit = web::Data::new(UploadLimit(config.max_upload_bytes));

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(converter.clone())
            .app_data(upload_limit.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(routes::configure)
    })
    .bind(config.bind_address())?
    .run()
    .await
}
