use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::Config;
use crate::routes::{grade_handler, json_error_handler, xqueue_handler};
use crate::supervisor::Supervisor;

/// Registers every grading endpoint; the app must provide `web::Data<Supervisor>`
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .content_type_required(false)
            .error_handler(json_error_handler),
    )
    .service(web::resource(["/", "/xqueue"]).route(web::post().to(xqueue_handler)))
    .service(grade_handler);
}

pub fn build_server(config: Config) -> std::io::Result<Server> {
    let Config {
        server: server_config,
        grader: grader_config,
    } = config;

    let supervisor = Supervisor::new(&grader_config)?;
    log::info!(
        "Grading with a {:?} limit, staging submissions in {}",
        supervisor.timeout(),
        grader_config.staging_dir().display()
    );
    let supervisor = web::Data::new(supervisor);

    let bind_address = server_config
        .bind_address
        .unwrap_or("127.0.0.1".to_string());
    let bind_port = server_config.bind_port.unwrap_or(1710);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(supervisor.clone())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind((bind_address.as_str(), bind_port))?
    .run();

    log::info!("Grader started on {bind_address}:{bind_port}");
    Ok(server)
}
