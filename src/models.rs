//! Modelos de Configuração do Pipeline
//!
//! ## Visão Geral
//! Este módulo define as estruturas de dados para a configuração do pipeline
//! ETL em TOML: a API de origem, a tabela fato, as dimensões derivadas dos
//! metadados e a raiz do data lake de destino.
//!
//! ## Boas Práticas
//! - **Encapsulamento**: Validações de integridade ocorrem no momento da carga.
//! - **Fail-Fast**: Configuração inválida interrompe o pipeline antes de
//!   qualquer requisição ou escrita.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::PipelineError;

/// Configuração completa do pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub fact: FactConfig,

    /// Dimensões de referência, indexadas pelo nome da tabela de destino.
    #[serde(default)]
    pub dimensions: HashMap<String, DimensionConfig>,
}

/// Ponto de acesso à API de origem.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Ponto de entrada base (ex: https://api.rawg.io/api).
    pub base_url: String,

    /// Chave da resposta JSON que contém a lista de resultados (ex: "results").
    pub data_field: Option<String>,

    /// Parâmetros de consulta enviados em toda requisição (ex: a API key).
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Cabeçalhos enviados em toda requisição.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Tamanho de página da paginação.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Destino no data lake.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Raiz dos datasets (caminho local ou URI de object storage).
    pub root: String,

    /// Opções de conexão repassadas ao backend (credenciais, endpoint).
    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// Tabela fato extraída da API.
#[derive(Debug, Deserialize, Clone)]
pub struct FactConfig {
    /// Recurso da API (ex: "games").
    pub endpoint: String,

    /// Limite de páginas da extração.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Colunas com listas de objetos aninhados a achatar para listas de ids.
    #[serde(default)]
    pub json_columns: Vec<String>,

    /// Colunas mantidas na gravação; vazio mantém todas.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Estratégia de gravação.
    #[serde(default)]
    pub mode: WriteMode,

    /// Particionamento físico, aplicado somente na criação da tabela.
    #[serde(default)]
    pub partition_by: Vec<String>,
}

/// Dimensão de referência reconciliada contra os metadados embutidos no fato.
#[derive(Debug, Deserialize, Clone)]
pub struct DimensionConfig {
    /// Recurso de metadados da API (ex: "genres").
    pub endpoint: String,

    /// Coluna do fato que embute os objetos desta dimensão (ex: "genres").
    pub source_column: String,

    /// Chave de desembrulho quando os objetos vêm aninhados
    /// (ex: "platform" em `{"platform": {...}}`).
    pub inner_key: Option<String>,

    /// Limite de páginas da extração de metadados.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Colunas além de `{id, name, games_count}` mantidas na dimensão.
    #[serde(default)]
    pub extra_columns: Vec<String>,

    /// Estratégia de gravação.
    #[serde(default)]
    pub mode: WriteMode,
}

/// Estratégia de gravação de uma tabela no data lake.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Primeira escrita cria a tabela; as seguintes fazem merge por id.
    #[default]
    Merge,

    /// Toda escrita substitui o conteúdo completo.
    Overwrite,
}

fn default_page_size() -> u32 {
    40
}

fn default_max_pages() -> u32 {
    1
}

impl Config {
    /// Carrega e valida o ficheiro de configuração TOML.
    ///
    /// # Erros
    /// Retorna `PipelineError::Io` se o ficheiro não for encontrado ou
    /// `PipelineError::Schema` se a estrutura for inválida.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path).map_err(PipelineError::Io)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| PipelineError::Schema(format!("Erro no TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validação pós-carga (Fail-Fast).
    fn validate(&self) -> Result<(), PipelineError> {
        if self.api.base_url.is_empty() {
            return Err(PipelineError::Schema("api sem base_url".to_string()));
        }
        if self.storage.root.is_empty() {
            return Err(PipelineError::Schema("storage sem root".to_string()));
        }
        if self.fact.endpoint.is_empty() {
            return Err(PipelineError::Schema("fact sem endpoint".to_string()));
        }

        for (nome, dim) in &self.dimensions {
            if dim.endpoint.is_empty() {
                return Err(PipelineError::Schema(format!("dimensão '{}' sem endpoint", nome)));
            }
            if dim.source_column.is_empty() {
                return Err(PipelineError::Schema(format!(
                    "dimensão '{}' sem source_column",
                    nome
                )));
            }
        }
        Ok(())
    }
}

impl StorageConfig {
    /// Localização do dataset de uma tabela sob a raiz, sem barras duplicadas.
    pub fn table_location(&self, tabela: &str) -> String {
        let raiz = self.root.trim_end_matches('/');
        let tabela = tabela.trim_start_matches('/');
        format!("{}/{}", raiz, tabela)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXEMPLO: &str = r#"
        [api]
        base_url = "https://api.rawg.io/api"
        data_field = "results"

        [api.params]
        key = "segredo"

        [storage]
        root = "data/lake"

        [fact]
        endpoint = "games"
        max_pages = 3
        json_columns = ["genres"]

        [dimensions.genres]
        endpoint = "genres"
        source_column = "genres"
        extra_columns = ["slug"]
        mode = "overwrite"
    "#;

    #[test]
    fn carrega_configuracao_completa() {
        let config: Config = toml::from_str(EXEMPLO).unwrap();
        config.validate().unwrap();

        assert_eq!(config.api.page_size, 40);
        assert_eq!(config.fact.max_pages, 3);
        assert_eq!(config.fact.mode, WriteMode::Merge);

        let genres = &config.dimensions["genres"];
        assert_eq!(genres.mode, WriteMode::Overwrite);
        assert_eq!(genres.max_pages, 1);
        assert_eq!(genres.extra_columns, vec!["slug".to_string()]);
    }

    #[test]
    fn rejeita_base_url_vazia() {
        let mut config: Config = toml::from_str(EXEMPLO).unwrap();
        config.api.base_url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejeita_dimensao_sem_source_column() {
        let mut config: Config = toml::from_str(EXEMPLO).unwrap();
        config
            .dimensions
            .get_mut("genres")
            .unwrap()
            .source_column
            .clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn monta_localizacao_sem_barras_duplicadas() {
        let storage = StorageConfig {
            root: "s3://lake/raw/".to_string(),
            options: HashMap::new(),
        };
        assert_eq!(storage.table_location("genres"), "s3://lake/raw/genres");
    }
}
