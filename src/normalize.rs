//! # Normalização de JSON Aninhado
//!
//! ## Visão Geral
//! As respostas da API carregam colunas com listas de objetos aninhados
//! (ex: `genres`, `platforms`). Este módulo trabalha sobre as linhas cruas
//! (`serde_json::Value`) ainda na fronteira de ingestão: toda coerção acontece
//! aqui, antes do DataFrame tipado existir, nunca no meio do pipeline.
//!
//! ## Operações
//! - `cast_json`: strings que representam estruturas viram estruturas reais.
//! - `flatten_ids`: listas de objetos viram listas planas de identificadores.
//! - `collect_objects`: reúne os objetos embutidos de uma coluna (metadados de
//!   dimensão que a API envia dentro das linhas de fato).
//! - `rows_to_dataframe`: ingestão das linhas cruas no Polars.

use std::io::Cursor;
use std::num::NonZeroUsize;

use polars::prelude::*;
use serde_json::Value;

use crate::errors::PipelineError;

/// Converte strings que representam listas/objetos em estruturas reais.
///
/// Células que não são string passam inalteradas. Política explícita de
/// coerção: uma string que não é JSON válido vira `null` (marcador de vazio),
/// sem erro e sem log, e é filtrada pelas etapas seguintes.
pub fn cast_json(rows: &mut [Value], column: &str) {
    for linha in rows.iter_mut() {
        let Some(objeto) = linha.as_object_mut() else {
            continue;
        };
        let Some(celula) = objeto.get_mut(column) else {
            continue;
        };
        if let Value::String(texto) = celula {
            *celula = serde_json::from_str(texto).unwrap_or(Value::Null);
        }
    }
}

/// Normaliza uma coluna de listas de objetos, extraindo apenas o valor de uma
/// chave (geralmente um ID).
///
/// Tolerante às estruturas aninhadas comuns em APIs: a chave é procurada no
/// nível superior de cada objeto e, se ausente, em um subobjeto imediato
/// (ex: `{"platform": {"id": 7}}`). Sem correspondência, a posição vira `null`.
/// A ordem da lista de saída segue a da entrada; células que não são lista
/// viram listas vazias.
pub fn flatten_ids(rows: &mut [Value], column: &str, key: &str) {
    for linha in rows.iter_mut() {
        let Some(objeto) = linha.as_object_mut() else {
            continue;
        };
        let celula = objeto.entry(column).or_insert(Value::Null);

        let plano = match celula.as_array() {
            Some(itens) => itens.iter().map(|item| extract_key(item, key)).collect(),
            None => Vec::new(),
        };
        *celula = Value::Array(plano);
    }
}

/// Procura a chave no objeto e, em seguida, nos subobjetos imediatos.
fn extract_key(item: &Value, key: &str) -> Value {
    let Some(mapa) = item.as_object() else {
        return Value::Null;
    };

    if let Some(valor) = mapa.get(key) {
        return valor.clone();
    }

    for valor in mapa.values() {
        if let Some(sub) = valor.as_object()
            && let Some(encontrado) = sub.get(key)
        {
            return encontrado.clone();
        }
    }

    Value::Null
}

/// Reúne os objetos embutidos de uma coluna de listas, em todas as linhas.
///
/// Com `inner`, desembrulha um nível (ex: elementos `{"platform": {...}}`
/// contribuem o subobjeto `platform`). Elementos que não são objetos são
/// ignorados.
pub fn collect_objects(rows: &[Value], column: &str, inner: Option<&str>) -> Vec<Value> {
    let mut objetos = Vec::new();

    for linha in rows {
        let Some(itens) = linha.get(column).and_then(Value::as_array) else {
            continue;
        };
        for item in itens {
            let alvo = match inner {
                Some(chave) => item.get(chave).filter(|v| v.is_object()).unwrap_or(item),
                None => item,
            };
            if alvo.is_object() {
                objetos.push(alvo.clone());
            }
        }
    }

    objetos
}

/// Ingestão das linhas cruas no Polars com inferência completa de schema.
pub fn rows_to_dataframe(rows: &[Value]) -> Result<DataFrame, PipelineError> {
    if rows.is_empty() {
        return Ok(DataFrame::empty());
    }

    let json_bytes = serde_json::to_vec(rows)?;
    let cursor = Cursor::new(json_bytes);

    let df = JsonReader::new(cursor)
        .infer_schema_len(NonZeroUsize::new(rows.len()))
        .finish()
        .map_err(|e| PipelineError::Frame(format!("Erro ao converter JSON para DataFrame: {}", e)))?;

    Ok(df)
}
