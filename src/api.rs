//! # Camada de Extração (API REST)
//!
//! ## Visão Geral
//! Uma requisição GET por chamada: o extrator valida o status HTTP, faz o parse
//! do corpo JSON e, se solicitado, desembrulha o campo principal de dados
//! (ex: "results"). Paginação é responsabilidade do chamador, via chamadas
//! repetidas com `params` diferentes.
//!
//! ## Contrato de Falha
//! Nenhuma falha de rede ou de formato chega ao chamador como erro: o extrator
//! registra o diagnóstico em log e sinaliza ausência de dados (`None`).

use std::collections::HashMap;

use reqwest::blocking::Client;
use serde_json::Value;

/// Cria o cliente HTTP reutilizável do pipeline.
///
/// Reuso de conexões/Keep-alive para performance; sem timeout próprio
/// (herdado dos padrões do cliente).
pub fn create_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("data_games/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Executa uma solicitação GET e retorna os dados extraídos.
///
/// # Arguments
///
/// * `client` - O cliente HTTP reutilizável.
/// * `base_url` - A URL base da API (ex: "https://api.rawg.io/api").
/// * `endpoint` - O recurso acessado (ex: "games").
/// * `data_field` - Chave principal da resposta JSON que contém a lista de
///   resultados (ex: "results"). Se `None`, retorna o corpo completo.
/// * `params` - Parâmetros de consulta (query parameters) da solicitação.
/// * `headers` - Cabeçalhos adicionais da solicitação.
///
/// # Returns
///
/// Os dados obtidos em formato JSON, ou `None` se a requisição falhar, o status
/// não for 2xx ou o corpo não tiver o formato esperado. O chamador deve checar
/// a ausência antes de prosseguir.
pub fn fetch_data(
    client: &Client,
    base_url: &str,
    endpoint: &str,
    data_field: Option<&str>,
    params: Option<&HashMap<String, String>>,
    headers: Option<&HashMap<String, String>>,
) -> Option<Value> {
    let url = join_url(base_url, endpoint);

    let mut pedido = client.get(&url);
    if let Some(query) = params {
        pedido = pedido.query(query);
    }
    if let Some(extras) = headers {
        for (chave, valor) in extras {
            pedido = pedido.header(chave.as_str(), valor.as_str());
        }
    }

    // Status não-2xx vira falha pela mesma via dos erros de conexão.
    let resposta = match pedido.send().and_then(|r| r.error_for_status()) {
        Ok(r) => r,
        Err(e) => {
            log::error!("A requisição para {} falhou: {}", url, e);
            return None;
        }
    };

    let corpo: Value = match resposta.json() {
        Ok(v) => v,
        Err(e) => {
            log::error!("O formato de resposta de {} não é o esperado: {}", url, e);
            return None;
        }
    };

    extract_field(corpo, data_field, &url)
}

/// Desembrulha o campo principal de dados do corpo JSON, quando solicitado.
fn extract_field(corpo: Value, data_field: Option<&str>, url: &str) -> Option<Value> {
    let Some(campo) = data_field else {
        return Some(corpo);
    };

    let valor = match corpo {
        Value::Object(mut mapa) => mapa.remove(campo),
        _ => None,
    };

    if valor.is_none() {
        log::error!(
            "O formato de resposta de {} não é o esperado: campo '{}' ausente",
            url,
            campo
        );
    }
    valor
}

/// Concatenação segura de URLs sem barras duplicadas.
fn join_url(base: &str, endpoint: &str) -> String {
    let base_trimmed = base.trim_end_matches('/');
    let endpoint_trimmed = endpoint.trim_start_matches('/');
    format!("{}/{}", base_trimmed, endpoint_trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extrai_campo_de_dados_quando_informado() {
        let corpo = json!({"count": 2, "results": [{"id": 1}, {"id": 2}]});
        let dados = extract_field(corpo, Some("results"), "http://teste");
        assert_eq!(dados, Some(json!([{"id": 1}, {"id": 2}])));
    }

    #[test]
    fn retorna_corpo_completo_sem_campo_de_dados() {
        let corpo = json!({"count": 0, "results": []});
        let dados = extract_field(corpo.clone(), None, "http://teste");
        assert_eq!(dados, Some(corpo));
    }

    #[test]
    fn sinaliza_ausencia_quando_campo_nao_existe() {
        let corpo = json!({"erro": "not found"});
        assert_eq!(extract_field(corpo, Some("results"), "http://teste"), None);
    }

    #[test]
    fn sinaliza_ausencia_quando_corpo_nao_e_objeto() {
        assert_eq!(extract_field(json!([1, 2]), Some("results"), "http://teste"), None);
    }

    #[test]
    fn junta_urls_sem_barras_duplicadas() {
        assert_eq!(join_url("https://api.exemplo.io/api/", "/games"), "https://api.exemplo.io/api/games");
        assert_eq!(join_url("https://api.exemplo.io/api", "games"), "https://api.exemplo.io/api/games");
    }
}
