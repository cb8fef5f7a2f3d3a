//! # Graph Input and Output
//!
//! Reads a graph file as `src dst` edge lines, `id n1 n2 ...` vertex lines or
//! ready-made adjacency records, and writes final records to a file or stdout.

use std::path::Path;

use clap::ValueEnum;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use graph_rounds::{
    adjacency_from_edges, adjacency_from_vertices, encode_vertex, FormatError, GraphKind, Vertex,
    VertexId,
};

/// Layout of the input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputFormat {
    /// Whitespace-separated `src dst` lines
    #[default]
    Edges,
    /// Whitespace-separated `id n1 n2 ...` lines
    Vertices,
    /// One adjacency record per line
    Adjacency,
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid graph input: {0}")]
    Format(#[from] FormatError),

    #[error("Graph input contains no vertices")]
    Empty,
}

/// Load a graph file as adjacency records
pub async fn load_records(
    path: &Path,
    format: InputFormat,
    kind: GraphKind,
) -> Result<Vec<String>, InputError> {
    let text = fs::read_to_string(path).await.map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let records: Vec<String> = match format {
        InputFormat::Edges => encode_all(&adjacency_from_edges(text.lines(), kind)?),
        InputFormat::Vertices => encode_all(&adjacency_from_vertices(text.lines(), kind)?),
        InputFormat::Adjacency => text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect(),
    };

    if records.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(records)
}

fn encode_all(vertices: &[Vertex]) -> Vec<String> {
    vertices.iter().map(encode_vertex).collect()
}

/// Largest vertex id among adjacency records
pub fn max_vertex_id(records: &[String]) -> Result<u64, InputError> {
    let mut max = None;
    for line in records {
        let head = line.split('\t').next().unwrap_or_default();
        let id: VertexId = head
            .parse()
            .map_err(|e| FormatError::new(line.as_str(), format!("invalid vertex id: {}", e)))?;
        max = max.max(Some(id.get()));
    }
    max.ok_or(InputError::Empty)
}

/// Write records to `path`, or to stdout when no path is given
pub async fn write_records(path: Option<&Path>, records: &[String]) -> std::io::Result<()> {
    match path {
        Some(path) => {
            let file = fs::File::create(path).await?;
            write_lines(BufWriter::new(file), records).await
        }
        None => write_lines(BufWriter::new(tokio::io::stdout()), records).await,
    }
}

async fn write_lines<W: AsyncWriteExt + Unpin>(
    mut writer: W,
    records: &[String],
) -> std::io::Result<()> {
    for line in records {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn graph_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_edge_list() {
        let file = graph_file("# comment\n1 2\n2 3\n\n");
        let records = load_records(file.path(), InputFormat::Edges, GraphKind::Undirected)
            .await
            .unwrap();

        assert_eq!(records, vec!["1\t2", "2\t1,3", "3\t2"]);
        assert_eq!(max_vertex_id(&records).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_load_directed_vertex_list() {
        let file = graph_file("1 2 3\n2 3\n3\n");
        let records = load_records(file.path(), InputFormat::Vertices, GraphKind::Directed)
            .await
            .unwrap();

        assert_eq!(records, vec!["1\t#\t@2,3", "2\t#1\t@3", "3\t#1,2\t@"]);
    }

    #[tokio::test]
    async fn test_load_adjacency_records() {
        let file = graph_file("1\t#\t@2\n2\t#1\t@\n");
        let records = load_records(file.path(), InputFormat::Adjacency, GraphKind::Directed)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let file = graph_file("# nothing here\n");
        let err = load_records(file.path(), InputFormat::Edges, GraphKind::Undirected)
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::Empty));
    }

    #[tokio::test]
    async fn test_malformed_edge_line() {
        let file = graph_file("1 2 3\n");
        let err = load_records(file.path(), InputFormat::Edges, GraphKind::Undirected)
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::Format(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = load_records(
            Path::new("/nonexistent/graph.txt"),
            InputFormat::Edges,
            GraphKind::Undirected,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/graph.txt"));
    }

    #[tokio::test]
    async fn test_write_records_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let records = vec!["1\t2".to_string(), "2\t1".to_string()];

        write_records(Some(&path), &records).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "1\t2\n2\t1\n");
    }
}
