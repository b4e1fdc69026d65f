//! Key and tag builders for CRM entities.
//!
//! Builders sort their inputs so the same logical query always maps to the
//! same key regardless of argument order.

/// Key for a database row, optionally narrowed to a set of fields.
///
/// `db_key("clientes", "7", Some(&["nome", "cnpj"]))` is
/// `db:clientes:7-cnpj,nome`.
pub fn db_key(table: &str, id: &str, fields: Option<&[&str]>) -> String {
    let mut key = format!("db:{}:{}", table, id);
    if let Some(fields) = fields {
        let mut fields = fields.to_vec();
        fields.sort_unstable();
        key.push('-');
        key.push_str(&fields.join(","));
    }
    key
}

/// Key for an API response, with query parameters sorted by name.
///
/// `api_key("/api/clientes", Some(&[("page", "2"), ("limit", "10")]))` is
/// `api:/api/clientes-limit:10,page:2`.
pub fn api_key(endpoint: &str, params: Option<&[(&str, &str)]>) -> String {
    let mut key = format!("api:{}", endpoint);
    if let Some(params) = params {
        let mut params = params.to_vec();
        params.sort_by(|a, b| a.0.cmp(b.0));
        let joined: Vec<String> = params.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
        key.push('-');
        key.push_str(&joined.join(","));
    }
    key
}

/// Key for a per-user resource.
pub fn user_key(user_id: &str, resource: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("user:{}:{}:{}", user_id, resource, id),
        None => format!("user:{}:{}", user_id, resource),
    }
}

/// Tag sets for CRM entities: the entity's own tag plus its collection tag.
pub mod tags {
    fn entity(singular: &str, plural: &str, id: &str) -> Vec<String> {
        vec![format!("{}:{}", singular, id), plural.to_string()]
    }

    pub fn cliente(id: &str) -> Vec<String> {
        entity("cliente", "clientes", id)
    }

    pub fn oportunidade(id: &str) -> Vec<String> {
        entity("oportunidade", "oportunidades", id)
    }

    pub fn licitacao(id: &str) -> Vec<String> {
        entity("licitacao", "licitacoes", id)
    }

    pub fn documento(id: &str) -> Vec<String> {
        entity("documento", "documentos", id)
    }

    pub fn user(id: &str) -> Vec<String> {
        entity("user", "users", id)
    }

    /// Borrow a tag list in the form cache calls accept.
    pub fn as_refs(tags: &[String]) -> Vec<&str> {
        tags.iter().map(String::as_str).collect()
    }
}
