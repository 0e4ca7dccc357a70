//! # Construção de Tabelas de Dimensão
//!
//! A partir dos metadados da API (ex: gêneros, plataformas), produz tabelas de
//! referência com id único e nome saneado. Coerções que falham viram nulos e
//! são descartadas na sequência, sem erro e sem log.

use std::collections::HashSet;

use polars::prelude::*;

use crate::errors::PipelineError;

/// Colunas fixas de toda dimensão.
const BASE_COLS: [&str; 3] = ["id", "name", "games_count"];

/// Constrói uma tabela de dimensão a partir de um lote de metadados.
///
/// 1. Seleciona `{id, name, games_count}` mais as colunas extras.
/// 2. Coage `id` e `games_count` para inteiros anuláveis.
/// 3. Sanea `name`: apara espaços, minúsculas e depois Title Case.
/// 4. Remove linhas sem `id` ou sem `name` pós-coerção.
/// 5. Remove ids duplicados, mantendo a primeira ocorrência na ordem original.
///
/// Garantia: saída com `id` único e não-nulo, `name` não-nulo, na ordem
/// filtrada da entrada (sem reordenação). Aplicar duas vezes produz o mesmo
/// lote.
pub fn build_dimension(df_meta: &DataFrame, extra_cols: &[&str]) -> Result<DataFrame, PipelineError> {
    let mut cols: Vec<&str> = BASE_COLS.to_vec();
    cols.extend_from_slice(extra_cols);

    let mut df_dim = df_meta.select(cols)?;

    // Coerção numérica: valores não-numéricos viram nulo
    let id = df_dim.column("id")?.cast(&DataType::Int64)?;
    df_dim.with_column(id)?;
    let contagem = df_dim.column("games_count")?.cast(&DataType::Int64)?;
    df_dim.with_column(contagem)?;

    // Saneamento dos nomes
    let nomes = df_dim
        .column("name")?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let ajustados: StringChunked = nomes
        .str()?
        .into_iter()
        .map(|opcao| opcao.map(formatar_nome))
        .collect();
    let mut ajustados = ajustados.into_series();
    ajustados.rename("name".into());
    df_dim.with_column(ajustados)?;

    // Elimina as linhas que ficaram sem id ou sem nome
    let mascara = df_dim.column("id")?.as_materialized_series().is_not_null()
        & df_dim.column("name")?.as_materialized_series().is_not_null();
    let df_dim = df_dim.filter(&mascara)?;

    // Elimina duplicados por id, primeira ocorrência vence
    let ids = df_dim.column("id")?.as_materialized_series();
    let mut vistos = HashSet::new();
    let primeiros: BooleanChunked = ids
        .i64()?
        .into_iter()
        .map(|opcao| Some(matches!(opcao, Some(id) if vistos.insert(id))))
        .collect();

    Ok(df_dim.filter(&primeiros)?)
}

/// Apara espaços, minúsculas e Title Case por palavra.
///
/// Limite de palavra é qualquer caractere não-alfabético, portanto
/// "role-playing" vira "Role-Playing".
fn formatar_nome(texto: &str) -> String {
    let minusculo = texto.trim().to_lowercase();

    let mut saida = String::with_capacity(minusculo.len());
    let mut dentro_de_palavra = false;
    for c in minusculo.chars() {
        if c.is_alphabetic() {
            if dentro_de_palavra {
                saida.push(c);
            } else {
                saida.extend(c.to_uppercase());
            }
            dentro_de_palavra = true;
        } else {
            saida.push(c);
            dentro_de_palavra = false;
        }
    }
    saida
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn metadados() -> DataFrame {
        df!(
            "id" => ["1", "2", "x", "2"],
            "name" => [Some("  ACTION  "), Some("role-playing"), Some("shooter"), Some("duplicado")],
            "games_count" => ["10", "20", "30", "40"],
            "slug" => ["action", "role-playing", "shooter", "dup"]
        )
        .unwrap()
    }

    #[test]
    fn coage_tipos_e_sanea_nomes() {
        let dim = build_dimension(&metadados(), &["slug"]).unwrap();

        let nomes: Vec<Option<&str>> = dim
            .column("name")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(nomes, vec![Some("Action"), Some("Role-Playing")]);

        let ids: Vec<Option<i64>> = dim
            .column("id")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
    }

    #[test]
    fn descarta_linhas_sem_id_ou_sem_nome() {
        let meta = df!(
            "id" => [Some(1i64), None],
            "name" => ["a", "b"],
            "games_count" => [2i64, 1]
        )
        .unwrap();

        let dim = build_dimension(&meta, &[]).unwrap();
        assert_eq!(dim.height(), 1);

        let restante = dim.column("id").unwrap().as_materialized_series().i64().unwrap().get(0);
        assert_eq!(restante, Some(1));
    }

    #[test]
    fn deduplica_por_id_mantendo_a_primeira() {
        let dim = build_dimension(&metadados(), &["slug"]).unwrap();
        assert_eq!(dim.height(), 2);

        // a linha vencedora do id 2 é a primeira ocorrência
        let slugs: Vec<Option<&str>> = dim
            .column("slug")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(slugs, vec![Some("action"), Some("role-playing")]);
    }

    #[test]
    fn aplicar_duas_vezes_nao_muda_o_lote() {
        let uma_vez = build_dimension(&metadados(), &["slug"]).unwrap();
        let duas_vezes = build_dimension(&uma_vez, &["slug"]).unwrap();
        assert!(uma_vez.equals_missing(&duas_vezes));
    }
}
