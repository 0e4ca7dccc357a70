//! # Persistência no Data Lake
//!
//! ## Visão Geral
//! A escrita durável passa por uma porta estreita (`TableStore`) com cinco
//! operações: existe, carrega, cria (fail-if-exists), upsert por chave e
//! sobrescreve. Qualquer backend de formato de tabela satisfaz a porta sem
//! tocar os chamadores; o backend deste repositório é Parquet via Polars, com
//! layout hive (`coluna=valor/`) para datasets particionados.
//!
//! ## Contagem aproximada do merge
//! Os totais de inseridos/atualizados registrados em log saem de aritmética de
//! conjuntos sobre os ids em forma textual, não do próprio motor de merge. Se
//! o predicado de correspondência do backend divergir da igualdade simples de
//! id (coerções de tipo, por exemplo), os totais podem ficar imprecisos.
//! Limitação conhecida, mantida de propósito.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

/// Nome do marcador de existência do dataset, gravado na criação.
const MANIFESTO: &str = "_manifest.json";

/// Nome do arquivo de dados de cada diretório do dataset.
const ARQUIVO_PARTE: &str = "part-0.parquet";

/// Metadados fixados na criação do dataset.
///
/// O particionamento é definido uma única vez, aqui; escritas posteriores o
/// honram e nunca o rederivam de entrada do chamador.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifesto {
    partition_by: Vec<String>,
}

/// Porta de armazenamento de tabelas.
///
/// `location` identifica um dataset; cada chamada afeta exatamente um
/// dataset e não há transação entre localizações distintas.
pub trait TableStore {
    /// Verifica se já existe um dataset na localização.
    fn exists(&self, location: &str) -> bool;

    /// Carrega o dataset completo.
    fn load(&self, location: &str) -> Result<DataFrame, StorageError>;

    /// Cria um dataset novo em modo fail-if-exists, com particionamento
    /// físico opcional fixado neste momento.
    fn create(
        &self,
        df: &mut DataFrame,
        location: &str,
        partition_by: Option<&[String]>,
    ) -> Result<(), StorageError>;

    /// Upsert por chave: linhas com chave já existente são sobrescritas por
    /// inteiro, as demais são inseridas.
    fn upsert_by_key(&self, df: &mut DataFrame, location: &str, key: &str)
    -> Result<(), StorageError>;

    /// Substitui incondicionalmente todo o conteúdo do dataset.
    fn overwrite(&self, df: &mut DataFrame, location: &str) -> Result<(), StorageError>;
}

/* ========================================================================== */
/* Pontos de entrada do Persistor                                             */
/* ========================================================================== */

/// Grava o lote na localização: merge por id se a tabela já existe, criação
/// (com particionamento opcional) caso contrário.
///
/// O particionamento só é aplicado na primeira escrita. A contagem de
/// inseridos/atualizados registrada em log é aproximada (ver módulo).
pub fn merge_or_create(
    store: &dyn TableStore,
    df: &mut DataFrame,
    location: &str,
    partition_by: Option<&[String]>,
) -> Result<(), StorageError> {
    if store.exists(location) {
        log::info!("A tabela em {} já existe. Executando MERGE...", location);

        let atual = store.load(location)?;
        let ids_anteriores = ids_como_texto(&atual, "id")?;
        let ids_novos = ids_como_texto(df, "id")?;

        store.upsert_by_key(df, location, "id")?;

        // Contagem aproximada por pertencimento de conjuntos
        let atualizados = ids_novos.intersection(&ids_anteriores).count();
        let inseridos = ids_novos.difference(&ids_anteriores).count();
        log::info!(
            "Merge executado corretamente. {} registros inseridos, {} registros atualizados.",
            inseridos,
            atualizados
        );
    } else {
        log::info!("Não existe a tabela. Criando uma nova em {}...", location);

        store.create(df, location, partition_by)?;
        log::info!("Tabela criada em {}. {} registros inseridos.", location, df.height());
    }

    Ok(())
}

/// Sobrescreve o dataset da localização com o conteúdo do lote.
/// Se existe, é substituído; se não existe, é criado.
pub fn overwrite(
    store: &dyn TableStore,
    df: &mut DataFrame,
    location: &str,
) -> Result<(), StorageError> {
    store.overwrite(df, location)?;
    log::info!("Tabela em {} sobrescrita. {} registros gravados.", location, df.height());
    Ok(())
}

/// Coluna de ids em forma textual comparável (nulos viram string vazia).
fn ids_como_texto(df: &DataFrame, col: &str) -> Result<HashSet<String>, StorageError> {
    Ok(df
        .column(col)?
        .as_materialized_series()
        .iter()
        .map(|valor| valor_plano(&valor))
        .collect())
}

/// Forma textual de um valor sem as aspas de exibição do Polars.
fn valor_plano(valor: &AnyValue) -> String {
    match valor {
        AnyValue::Null => String::new(),
        AnyValue::String(texto) => (*texto).to_string(),
        AnyValue::StringOwned(texto) => texto.to_string(),
        outro => outro.to_string(),
    }
}

/* ========================================================================== */
/* Backend Parquet                                                            */
/* ========================================================================== */

/// Backend local da porta `TableStore`: um diretório por dataset, um arquivo
/// Parquet por diretório de partição e um manifesto gravado na criação.
pub struct ParquetStore {
    /// Opções de conexão ao armazenamento (credenciais, endpoint). O backend
    /// local de sistema de arquivos não as consome.
    #[allow(dead_code)]
    options: HashMap<String, String>,
}

impl ParquetStore {
    pub fn new(options: HashMap<String, String>) -> Self {
        Self { options }
    }

    /// Grava o lote no diretório do dataset, honrando o particionamento.
    fn escrever_dataset(
        &self,
        df: &mut DataFrame,
        raiz: &Path,
        partition_by: &[String],
    ) -> Result<(), StorageError> {
        if partition_by.is_empty() {
            return escrever_parquet(df, &raiz.join(ARQUIVO_PARTE));
        }

        for mut parte in df.partition_by(partition_by.iter().cloned(), true)? {
            let mut dir = raiz.to_path_buf();
            for coluna in partition_by {
                let valor = parte.column(coluna)?.as_materialized_series().get(0)?;
                dir = dir.join(format!("{}={}", coluna, valor_plano(&valor)));
            }
            fs::create_dir_all(&dir)?;
            escrever_parquet(&mut parte, &dir.join(ARQUIVO_PARTE))?;
        }
        Ok(())
    }

    fn ler_manifesto(&self, raiz: &Path) -> Result<Manifesto, StorageError> {
        let conteudo = fs::read_to_string(raiz.join(MANIFESTO))?;
        Ok(serde_json::from_str(&conteudo)?)
    }

    fn gravar_manifesto(&self, raiz: &Path, manifesto: &Manifesto) -> Result<(), StorageError> {
        fs::write(raiz.join(MANIFESTO), serde_json::to_string_pretty(manifesto)?)?;
        Ok(())
    }
}

impl TableStore for ParquetStore {
    fn exists(&self, location: &str) -> bool {
        Path::new(location).join(MANIFESTO).is_file()
    }

    fn load(&self, location: &str) -> Result<DataFrame, StorageError> {
        let mut partes = Vec::new();
        listar_parquet(Path::new(location), &mut partes)?;
        partes.sort();

        let mut quadros = partes.into_iter().map(|caminho| -> Result<DataFrame, StorageError> {
            ParquetReader::new(File::open(caminho)?)
                .finish()
                .map_err(|e| StorageError::Frame(format!("Erro ao ler Parquet: {}", e)))
        });

        let Some(primeiro) = quadros.next() else {
            return Ok(DataFrame::empty());
        };
        quadros.try_fold(primeiro?, |acumulado, quadro| Ok(acumulado.vstack(&quadro?)?))
    }

    fn create(
        &self,
        df: &mut DataFrame,
        location: &str,
        partition_by: Option<&[String]>,
    ) -> Result<(), StorageError> {
        if self.exists(location) {
            return Err(StorageError::TableExists(location.to_string()));
        }

        let raiz = Path::new(location);
        fs::create_dir_all(raiz)?;

        let particoes: Vec<String> = partition_by.unwrap_or_default().to_vec();
        self.escrever_dataset(df, raiz, &particoes)?;

        // O manifesto por último: o dataset só passa a existir completo
        self.gravar_manifesto(raiz, &Manifesto { partition_by: particoes })
    }

    fn upsert_by_key(
        &self,
        df: &mut DataFrame,
        location: &str,
        key: &str,
    ) -> Result<(), StorageError> {
        let raiz = Path::new(location);
        let manifesto = self.ler_manifesto(raiz)?;
        let atual = self.load(location)?;

        // Linhas existentes sem correspondência permanecem; as demais são
        // substituídas pelo lote novo por inteiro
        let chaves_novas = ids_como_texto(df, key)?;
        let sem_correspondencia: BooleanChunked = atual
            .column(key)?
            .as_materialized_series()
            .iter()
            .map(|valor| Some(!chaves_novas.contains(&valor_plano(&valor))))
            .collect();
        let mantidas = atual.filter(&sem_correspondencia)?;

        let lote = df.select(atual.get_column_names_owned())?;
        let mut resultado = mantidas.vstack(&lote)?;

        limpar_partes(raiz)?;
        self.escrever_dataset(&mut resultado, raiz, &manifesto.partition_by)
    }

    fn overwrite(&self, df: &mut DataFrame, location: &str) -> Result<(), StorageError> {
        let raiz = Path::new(location);
        if raiz.exists() {
            fs::remove_dir_all(raiz)?;
        }
        fs::create_dir_all(raiz)?;

        escrever_parquet(df, &raiz.join(ARQUIVO_PARTE))?;
        self.gravar_manifesto(raiz, &Manifesto::default())
    }
}

/// Escrita Parquet com compressão e estatísticas por coluna.
fn escrever_parquet(df: &mut DataFrame, caminho: &Path) -> Result<(), StorageError> {
    let arquivo = File::create(caminho)?;

    let stats_options = StatisticsOptions {
        min_value: true,
        max_value: true,
        null_count: true,
        distinct_count: false,
    };

    ParquetWriter::new(arquivo)
        .with_compression(ParquetCompression::Snappy)
        .with_statistics(stats_options)
        .finish(df)
        .map_err(|e| StorageError::Frame(format!("Erro ao gravar Parquet: {}", e)))?;

    Ok(())
}

/// Coleta recursivamente os arquivos Parquet de um dataset.
fn listar_parquet(dir: &Path, saida: &mut Vec<PathBuf>) -> Result<(), StorageError> {
    for entrada in fs::read_dir(dir)? {
        let caminho = entrada?.path();
        if caminho.is_dir() {
            listar_parquet(&caminho, saida)?;
        } else if caminho.extension().is_some_and(|ext| ext == "parquet") {
            saida.push(caminho);
        }
    }
    Ok(())
}

/// Remove os dados do dataset, preservando o manifesto.
fn limpar_partes(raiz: &Path) -> Result<(), StorageError> {
    for entrada in fs::read_dir(raiz)? {
        let caminho = entrada?.path();
        if caminho.file_name().is_some_and(|nome| nome == MANIFESTO) {
            continue;
        }
        if caminho.is_dir() {
            fs::remove_dir_all(&caminho)?;
        } else {
            fs::remove_file(&caminho)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use tempfile::tempdir;

    fn lote_inicial() -> DataFrame {
        df!(
            "id" => [1i64, 2],
            "name" => ["Action", "Indie"],
            "games_count" => [10i64, 20]
        )
        .unwrap()
    }

    fn ids_ordenados(df: &DataFrame) -> Vec<Option<i64>> {
        let ordenado = df.sort(["id"], SortMultipleOptions::default()).unwrap();
        ordenado
            .column("id")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn cria_tabela_nova_e_recarrega() {
        let dir = tempdir().unwrap();
        let destino = dir.path().join("genres").to_string_lossy().into_owned();
        let store = ParquetStore::new(HashMap::new());

        assert!(!store.exists(&destino));
        merge_or_create(&store, &mut lote_inicial(), &destino, None).unwrap();
        assert!(store.exists(&destino));

        let lido = store.load(&destino).unwrap();
        assert_eq!(lido.height(), 2);
    }

    #[test]
    fn criar_duas_vezes_e_erro_fatal() {
        let dir = tempdir().unwrap();
        let destino = dir.path().join("genres").to_string_lossy().into_owned();
        let store = ParquetStore::new(HashMap::new());

        store.create(&mut lote_inicial(), &destino, None).unwrap();
        let repetida = store.create(&mut lote_inicial(), &destino, None);
        assert!(matches!(repetida, Err(StorageError::TableExists(_))));
    }

    #[test]
    fn merge_atualiza_correspondentes_e_insere_novos() {
        let dir = tempdir().unwrap();
        let destino = dir.path().join("genres").to_string_lossy().into_owned();
        let store = ParquetStore::new(HashMap::new());

        merge_or_create(&store, &mut lote_inicial(), &destino, None).unwrap();

        // id 2 é correspondência (atualiza), id 3 é novo (insere)
        let mut novo = df!(
            "id" => [2i64, 3],
            "name" => ["Indie Renomeado", "Puzzle"],
            "games_count" => [99i64, 30]
        )
        .unwrap();
        merge_or_create(&store, &mut novo, &destino, None).unwrap();

        let lido = store.load(&destino).unwrap();
        assert_eq!(lido.height(), 3);
        assert_eq!(ids_ordenados(&lido), vec![Some(1), Some(2), Some(3)]);

        // todos os campos da linha correspondente foram sobrescritos
        let ordenado = lido.sort(["id"], SortMultipleOptions::default()).unwrap();
        let contagens: Vec<Option<i64>> = ordenado
            .column("games_count")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(contagens, vec![Some(10), Some(99), Some(30)]);
    }

    #[test]
    fn overwrite_descarta_conteudo_anterior() {
        let dir = tempdir().unwrap();
        let destino = dir.path().join("genres").to_string_lossy().into_owned();
        let store = ParquetStore::new(HashMap::new());

        merge_or_create(&store, &mut lote_inicial(), &destino, None).unwrap();

        let mut substituto = df!(
            "id" => [9i64],
            "name" => ["Racing"],
            "games_count" => [5i64]
        )
        .unwrap();
        overwrite(&store, &mut substituto, &destino).unwrap();

        let lido = store.load(&destino).unwrap();
        assert_eq!(lido.height(), 1);
        assert_eq!(ids_ordenados(&lido), vec![Some(9)]);
    }

    #[test]
    fn criacao_particionada_usa_diretorios_hive() {
        let dir = tempdir().unwrap();
        let destino = dir.path().join("games").to_string_lossy().into_owned();
        let store = ParquetStore::new(HashMap::new());

        let mut lote = df!(
            "id" => [1i64, 2, 3],
            "name" => ["a", "b", "c"],
            "released" => ["2025", "2025", "2024"]
        )
        .unwrap();
        let particao = vec!["released".to_string()];
        merge_or_create(&store, &mut lote, &destino, Some(&particao)).unwrap();

        assert!(Path::new(&destino).join("released=2025").join(ARQUIVO_PARTE).is_file());
        assert!(Path::new(&destino).join("released=2024").join(ARQUIVO_PARTE).is_file());

        let lido = store.load(&destino).unwrap();
        assert_eq!(lido.height(), 3);
        assert_eq!(ids_ordenados(&lido), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn merge_honra_o_particionamento_da_criacao() {
        let dir = tempdir().unwrap();
        let destino = dir.path().join("games").to_string_lossy().into_owned();
        let store = ParquetStore::new(HashMap::new());

        let mut lote = df!(
            "id" => [1i64],
            "name" => ["a"],
            "released" => ["2024"]
        )
        .unwrap();
        let particao = vec!["released".to_string()];
        merge_or_create(&store, &mut lote, &destino, Some(&particao)).unwrap();

        // o particionamento não é reaplicado a partir do chamador no merge
        let mut novo = df!(
            "id" => [2i64],
            "name" => ["b"],
            "released" => ["2025"]
        )
        .unwrap();
        merge_or_create(&store, &mut novo, &destino, None).unwrap();

        assert!(Path::new(&destino).join("released=2025").join(ARQUIVO_PARTE).is_file());
        assert_eq!(store.load(&destino).unwrap().height(), 2);
    }
}
