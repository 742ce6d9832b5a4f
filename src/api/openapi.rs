//! OpenAPI documentation and schema generation
//!
//! Compile-time OpenAPI document generation with utoipa, served at `/openapi.json`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// OpenAPI documentation for the mail-harvest REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mail-harvest REST API",
        version = "0.1.0",
        description = "Download every attachment a sender mailed you as one zip archive",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:4747", description = "Local development server")
    ),
    paths(
        crate::api::routes::download_attachment,
        crate::api::routes::download_attachment_form,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(
        schemas(
            crate::api::routes::HarvestParams,
            crate::error::ApiError,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "harvest", description = "Attachment harvesting"),
        (name = "system", description = "Health and API metadata")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by the harvest endpoints.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| *p == "/download/attachment"));
        assert!(paths.iter().any(|p| *p == "/health"));
        assert!(paths.iter().any(|p| *p == "/openapi.json"));
    }

    #[test]
    fn document_declares_bearer_scheme() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(
            json["components"]["securitySchemes"]["bearer"]["scheme"],
            "bearer"
        );
    }

    #[test]
    fn sender_parameter_keeps_its_wire_name() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let params = &json["paths"]["/download/attachment"]["get"]["parameters"];
        assert_eq!(params[0]["name"], "emailThatSentAttach");
        assert_eq!(params[0]["in"], "query");
    }
}
