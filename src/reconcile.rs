//! # Reconciliação Fato × Dimensão
//!
//! Identifica ids de dimensão ausentes na tabela fato e sintetiza linhas de
//! preenchimento para eles, marcadas com valores sentinela (-1 na contagem,
//! "unknown" nas colunas extras). A aritmética de conjuntos sobre os ids é a
//! única lógica própria desta etapa.

use std::collections::HashSet;

use polars::prelude::*;

use crate::errors::PipelineError;

/// Valor sentinela de contagem das linhas sintetizadas.
const CONTAGEM_SENTINELA: i64 = -1;

/// Marcador textual das colunas extras sintetizadas.
const EXTRA_SENTINELA: &str = "unknown";

/// Acrescenta à tabela fato uma linha de preenchimento para cada id da
/// dimensão que não aparece na coluna de ids do fato.
///
/// As linhas sintetizadas carregam id e nome da dimensão; `count_col` recebe
/// -1 e cada coluna de `extra_cols` recebe "unknown". Se o fato ainda não tem
/// essas colunas, elas são criadas com o mesmo valor padrão nas linhas
/// pré-existentes. As demais colunas do fato ficam nulas nas linhas novas.
///
/// O resultado volta ordenado de forma ascendente por id. A quantidade de
/// linhas sintetizadas é registrada em log — observacional, não retornada.
pub fn fill_missing(
    df_fact: &DataFrame,
    df_dim: &DataFrame,
    id_col: &str,
    name_col: &str,
    count_col: Option<&str>,
    extra_cols: &[&str],
) -> Result<DataFrame, PipelineError> {
    // Ids como inteiros simples nos dois lados
    let mut fato = df_fact.clone();
    let id_fato = fato.column(id_col)?.cast(&DataType::Int64)?;
    fato.with_column(id_fato)?;

    let mut dim = df_dim.select([id_col, name_col])?;
    let id_dim = dim.column(id_col)?.cast(&DataType::Int64)?;
    dim.with_column(id_dim)?;

    // Identifica faltantes: ids da dimensão − ids do fato
    let ids_fato: HashSet<i64> = fato
        .column(id_col)?
        .as_materialized_series()
        .i64()?
        .into_iter()
        .flatten()
        .collect();
    let ausentes: BooleanChunked = dim
        .column(id_col)?
        .as_materialized_series()
        .i64()?
        .into_iter()
        .map(|opcao| Some(matches!(opcao, Some(id) if !ids_fato.contains(&id))))
        .collect();
    let mut faltantes = dim.filter(&ausentes)?;

    log::info!("{} registros faltantes identificados.", faltantes.height());

    // Coluna de contagem: sentinela nas sintetizadas, padrão -1 se o fato não a tem
    if let Some(contagem) = count_col {
        if fato.column(contagem).is_err() {
            fato.with_column(Series::new(
                contagem.into(),
                vec![CONTAGEM_SENTINELA; fato.height()],
            ))?;
        }
        faltantes.with_column(Series::new(
            contagem.into(),
            vec![CONTAGEM_SENTINELA; faltantes.height()],
        ))?;
    }

    // Colunas extras: "unknown" nas sintetizadas e como padrão no fato
    for extra in extra_cols {
        if fato.column(extra).is_err() {
            fato.with_column(Series::new((*extra).into(), vec![EXTRA_SENTINELA; fato.height()]))?;
        }
        faltantes.with_column(Series::new(
            (*extra).into(),
            vec![EXTRA_SENTINELA; faltantes.height()],
        ))?;
    }

    // Completa o schema das sintetizadas com nulos e alinha a ordem das colunas
    for coluna in fato.get_columns() {
        if faltantes.column(coluna.name()).is_err() {
            faltantes.with_column(Series::full_null(
                coluna.name().clone(),
                faltantes.height(),
                coluna.dtype(),
            ))?;
        }
    }
    let faltantes = faltantes.select(fato.get_column_names_owned())?;

    // Concatena somente os faltantes e ordena por id
    let completo = fato.vstack(&faltantes)?;
    Ok(completo.sort([id_col], SortMultipleOptions::default())?)
}
