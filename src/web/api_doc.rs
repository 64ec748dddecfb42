use utoipa::OpenApi;

use super::api::error::ErrorResponse;
use super::api::iss::{BriefPosition, PositionResponse, WelcomeResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::iss::read_root,
        super::api::iss::read_sun,
        super::api::iss::read_position,
    ),
    components(
        schemas(
            WelcomeResponse,
            BriefPosition,
            PositionResponse,
            ErrorResponse,
            crate::position::PositionSample,
            crate::position::Visibility,
            crate::windows::Window,
        )
    ),
    info(
        title = "ISS-O-Mat API",
        description = "Latest ISS position and the windows during which it was in daylight",
        version = "0.1.0"
    ),
    tags(
        (name = "iss", description = "ISS position history")
    )
)]
pub struct ApiDoc;
