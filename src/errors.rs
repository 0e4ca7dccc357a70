//! # Definição de Erros do Pipeline
//!
//! Este módulo centraliza as falhas possíveis durante as etapas de
//! transformação e de persistência (ETL).
//!
//! # Error Handling Strategy
//! - **Tipagem:** Enums para tratamento exaustivo.
//! - **Extensibilidade:** Marcados como `non_exhaustive` para permitir evolução sem quebra de contrato.
//! - Falhas de rede/HTTP não aparecem aqui: o extrator as registra em log e
//!   sinaliza ausência de dados (`None`) ao chamador.

/// Enumeração central de falhas das etapas de configuração e transformação.
#[derive(Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// Falhas no sistema de arquivos (permissão, disco cheio, arquivo inexistente).
    /// Encapsula `std::io::Error`.
    Io(std::io::Error),

    /// Encapsula `serde_json::Error`.
    Json(serde_json::Error),

    /// Erros originados na engine de DataFrames.
    /// Armazenados como `String` para reduzir acoplamento direto.
    Frame(String),

    /// Violações de regras de negócio ou inconsistência de formato (ex: configuração inválida).
    Schema(String),
}

/// Falhas da camada de armazenamento (porta `TableStore`).
#[derive(Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// Falha ao criar diretórios, ler ou escrever arquivos do dataset.
    Io(std::io::Error),

    /// Manifesto do dataset ilegível ou inválido.
    Json(serde_json::Error),

    /// Erros originados na engine de DataFrames durante leitura/escrita.
    Frame(String),

    /// Tentativa de criar uma tabela que já existe (modo fail-if-exists).
    /// Propaga como erro fatal; nunca é capturada internamente.
    TableExists(String),
}
