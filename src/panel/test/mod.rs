use chrono::Utc;


/// Builds a server row pointing at an arbitrary base URI without touching a
/// database. Panel clients only read fields from the model.
pub(super) fn server_row(id: i32, panel_kind: &str, api_domain: &str) -> entity::server::Model {
    entity::server::Model {
        id,
        name: format!("Server {}", id),
        flag_emoji: None,
        ip_address: "192.0.2.1".to_string(),
        api_domain: api_domain.to_string(),
        admin_user: Some("admin".to_string()),
        admin_pass: Some("secret".to_string()),
        api_key: Some("test-key".to_string()),
        panel_kind: panel_kind.to_string(),
        capacity: 100,
        active_users_count: 0,
        location_tag: "loc".to_string(),
        region: "foreign".to_string(),
        server_category: "direct".to_string(),
        is_active: true,
        is_central: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
