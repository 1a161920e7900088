pub mod click;
pub mod delivery;
pub mod pixel;
pub mod reports;

pub use click::*;
pub use delivery::*;
pub use pixel::*;
pub use reports::*;

use actix_web::web;

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/img", web::get().to(pixel::track_pixel))
            .route("/click", web::get().to(click::track_click))
            .route("/delivery", web::post().to(delivery::report_delivery)),
    )
    .service(
        web::scope("/tracking")
            .route("/by_email", web::get().to(reports::by_email))
            .route("/latest", web::get().to(reports::latest))
            .route("/export", web::get().to(reports::export)),
    );
}
