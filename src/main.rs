//! # Games Data Lake Pipeline
//!
//! ## Visão Geral
//! Extração de dados paginados de uma API de jogos, normalização das colunas
//! JSON aninhadas, construção de dimensões de referência a partir dos
//! metadados e carga no data lake por merge ou sobrescrita.
//!
//! ## Princípios de Engenharia
//! - **Resiliência (Fail-Soft)**: Erros individuais em dimensões não abortam o pipeline.
//! - **Observabilidade**: Logs estruturados com tempos de execução por etapa.
//! - **Fronteira de ingestão**: Toda coerção de tipos acontece antes do
//!   DataFrame tipado existir.

mod api;
mod dimension;
mod errors;
mod impl_errors;
mod models;
mod normalize;
mod reconcile;
mod storage;

use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::models::{ApiConfig, Config, DimensionConfig, WriteMode};
use crate::storage::ParquetStore;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let global_timer = Instant::now();

    log::info!("--- INICIANDO ETL PIPELINE ---");

    // Carrega configuração TOML (permite passar caminho via CLI)
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "pipeline.toml".to_string());

    let config = match Config::load_from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Erro na carga de configuração: {}", e);
            std::process::exit(1);
        }
    };

    // Reuso de conexões/Keep-alive para performance
    let client = api::create_http_client()?;
    let store = ParquetStore::new(config.storage.options.clone());

    // ---- Tabela fato ----
    let step_timer = Instant::now();
    log::info!("Fato: {}", config.fact.endpoint);

    let mut linhas = fetch_paginado(
        &client,
        &config.api,
        &config.fact.endpoint,
        config.fact.max_pages,
    )?;
    if linhas.is_empty() {
        log::error!("Nenhum dado retornado por {}. Abortando.", config.fact.endpoint);
        std::process::exit(1);
    }

    for coluna in &config.fact.json_columns {
        normalize::cast_json(&mut linhas, coluna);
    }

    // Os objetos embutidos alimentam as dimensões observadas; precisam ser
    // coletados antes do achatamento
    let mut embutidos: HashMap<&str, Vec<Value>> = HashMap::new();
    for (nome, dim_cfg) in &config.dimensions {
        embutidos.insert(
            nome.as_str(),
            normalize::collect_objects(&linhas, &dim_cfg.source_column, dim_cfg.inner_key.as_deref()),
        );
    }

    for coluna in &config.fact.json_columns {
        normalize::flatten_ids(&mut linhas, coluna, "id");
    }

    let mut df_fato = normalize::rows_to_dataframe(&linhas)?;
    if !config.fact.columns.is_empty() {
        df_fato = df_fato.select(config.fact.columns.iter().map(String::as_str))?;
    }

    let destino = config.storage.table_location(&config.fact.endpoint);
    let particao = (!config.fact.partition_by.is_empty()).then_some(config.fact.partition_by.as_slice());
    match config.fact.mode {
        WriteMode::Merge => storage::merge_or_create(&store, &mut df_fato, &destino, particao)?,
        WriteMode::Overwrite => storage::overwrite(&store, &mut df_fato, &destino)?,
    }
    log::info!("Fato gravado ({:.2?})", step_timer.elapsed());

    // ---- Dimensões ----
    for (nome, dim_cfg) in &config.dimensions {
        let step_timer = Instant::now();
        log::info!("Dimensão: {}", nome);

        let observados = embutidos.remove(nome.as_str()).unwrap_or_default();
        match processar_dimensao(&client, &config, nome, dim_cfg, observados, &store) {
            Ok(()) => log::info!("Dimensão {} gravada ({:.2?})", nome, step_timer.elapsed()),
            Err(e) => log::error!("Falha na dimensão {}: {}", nome, e),
        }
    }

    log::info!(
        "Fim da extração e carga. Tempo de execução: {:.2?}",
        global_timer.elapsed()
    );

    Ok(())
}

/// Extrai as páginas de um recurso até falhar, vir vazia ou atingir o limite.
///
/// Cada página é uma chamada independente ao extrator com `page`/`page_size`
/// nos parâmetros de consulta; a ausência de dados encerra o laço sem erro.
fn fetch_paginado(
    client: &Client,
    api_cfg: &ApiConfig,
    endpoint: &str,
    max_pages: u32,
) -> Result<Vec<Value>, Box<dyn Error>> {
    let mut linhas = Vec::new();

    let pb = ProgressBar::new(max_pages as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Baixando {}", endpoint));

    for pagina in 1..=max_pages {
        let mut params = api_cfg.params.clone();
        params.insert("page".to_string(), pagina.to_string());
        params.insert("page_size".to_string(), api_cfg.page_size.to_string());

        let Some(dados) = api::fetch_data(
            client,
            &api_cfg.base_url,
            endpoint,
            api_cfg.data_field.as_deref(),
            Some(&params),
            Some(&api_cfg.headers),
        ) else {
            break;
        };

        let itens = match dados {
            Value::Array(itens) => itens,
            _ => {
                log::warn!("A resposta de {} não é uma lista; paginação encerrada", endpoint);
                break;
            }
        };
        if itens.is_empty() {
            break;
        }

        linhas.extend(itens);
        pb.inc(1);
    }

    pb.finish_and_clear();
    log::info!("{} registros baixados de {}", linhas.len(), endpoint);

    Ok(linhas)
}

/// Constrói, reconcilia e grava uma dimensão de referência.
///
/// A dimensão autoritativa vem do endpoint de metadados; a observada, dos
/// objetos que o fato embute. Ids presentes nos metadados mas nunca
/// observados entram como linhas de preenchimento com sentinelas.
fn processar_dimensao(
    client: &Client,
    config: &Config,
    nome: &str,
    dim_cfg: &DimensionConfig,
    observados: Vec<Value>,
    store: &ParquetStore,
) -> Result<(), Box<dyn Error>> {
    let extras: Vec<&str> = dim_cfg.extra_columns.iter().map(String::as_str).collect();

    let metadados = fetch_paginado(client, &config.api, &dim_cfg.endpoint, dim_cfg.max_pages)?;
    if metadados.is_empty() {
        return Err(format!("nenhum metadado retornado por {}", dim_cfg.endpoint).into());
    }
    let dimensao = dimension::build_dimension(&normalize::rows_to_dataframe(&metadados)?, &extras)?;

    let observada = if observados.is_empty() {
        dimensao_vazia(&extras)?
    } else {
        dimension::build_dimension(&normalize::rows_to_dataframe(&observados)?, &extras)?
    };

    let mut completa = reconcile::fill_missing(
        &observada,
        &dimensao,
        "id",
        "name",
        Some("games_count"),
        &extras,
    )?;

    let destino = config.storage.table_location(nome);
    match dim_cfg.mode {
        WriteMode::Merge => storage::merge_or_create(store, &mut completa, &destino, None)?,
        WriteMode::Overwrite => storage::overwrite(store, &mut completa, &destino)?,
    }

    Ok(())
}

/// Dimensão sem linhas com o schema mínimo, para quando o fato não embute
/// nenhum objeto da dimensão.
fn dimensao_vazia(extras: &[&str]) -> Result<DataFrame, PolarsError> {
    let mut colunas = vec![
        Series::new_empty("id".into(), &DataType::Int64).into_column(),
        Series::new_empty("name".into(), &DataType::String).into_column(),
        Series::new_empty("games_count".into(), &DataType::Int64).into_column(),
    ];
    for extra in extras {
        colunas.push(Series::new_empty((*extra).into(), &DataType::String).into_column());
    }
    DataFrame::new(colunas)
}
