//! Configuration templating
//!
//! Environment templates are YAML with `${...}` placeholders, rendered with
//! minijinja against an [`EnvTemplate`] built from the KieApp spec.
//!
//! - `${applicationName}`, `${console.name}` - plain values
//! - `{% for server in servers %}...{% endfor %}` - one block per server replica
//! - `{% if server.build %}...{% endif %}` - optional sections
//! - `$${VAR}` - a literal `${VAR}`, for shell snippets inside containers

mod context;
mod engine;
mod error;

pub use context::{
    AuthTemplate, BuildTemplate, ConsoleTemplate, EnvTemplate, ImageTemplate, RegistryTemplate,
    ServerTemplate, SmartRouterTemplate,
};
pub use engine::TemplateEngine;
pub use error::TemplateError;

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Story: Rendering an environment context
    // =========================================================================

    fn context() -> EnvTemplate {
        EnvTemplate {
            application_name: "demo".into(),
            product: "rhpam".into(),
            minor_version: "76".into(),
            image_tag: "1.0".into(),
            console: ConsoleTemplate {
                name: "rhpamcentr".into(),
                image_name: "businesscentral".into(),
                ..Default::default()
            },
            servers: vec![
                ServerTemplate {
                    kie_server_id: "demo-kieserver-0".into(),
                    ..Default::default()
                },
                ServerTemplate {
                    kie_server_id: "orders".into(),
                    build: Some(BuildTemplate {
                        image_stream_name: "demo-kieserver-1".into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_image_name_from_context() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render(
                "image: ${product}${minorVersion}-${console.imageName}-openshift:${imageTag}",
                &context(),
            )
            .unwrap();
        assert_eq!(rendered, "image: rhpam76-businesscentral-openshift:1.0");
    }

    #[test]
    fn test_optional_build_section() {
        let engine = TemplateEngine::new();
        let template = "{% for server in servers %}\n{% if server.build %}\n- ${server.build.imageStreamName}\n{% endif %}\n{% endfor %}\n";
        assert_eq!(engine.render(template, &context()).unwrap(), "- demo-kieserver-1\n");
    }

    #[test]
    fn test_auth_sections_absent_by_default() {
        let engine = TemplateEngine::new();
        let template = "{% if auth.sso or auth.ldap %}secured{% else %}plain{% endif %}";
        assert_eq!(engine.render(template, &context()).unwrap(), "plain");
    }
}
