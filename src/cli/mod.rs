//! CLI 모듈
//!
//! folio-graph 명령어 정의 및 구현

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::content::ObjectType;
use crate::knowledge::{catalog_documents, IndexOutcome, SearchMethod, SearchRequest};
use crate::photos::photo_document;
use crate::server::{self, AppState};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "folio-graph")]
#[command(version, about = "포트폴리오 하이브리드 검색 + 지식 그래프 서버", long_about = None)]
pub struct Cli {
    /// 데이터 디렉토리 (FOLIO_DATA_DIR 대신)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 콘텐츠 디렉토리 (FOLIO_CONTENT_DIR 대신)
    #[arg(long, global = true)]
    pub content_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP 서버 실행
    Serve {
        /// 바인드 주소 (FOLIO_BIND 대신)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// 논문/프로젝트/사진을 검색 인덱스에 추가
    Index {
        /// 변경이 없어도 다시 인덱싱
        #[arg(long)]
        force: bool,
    },

    /// 지식 그래프 재빌드 (새 세대 게시)
    BuildGraph,

    /// 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// 종류 필터 (publication, project, photo)
        #[arg(short = 't', long = "type")]
        object_type: Option<ObjectType>,

        /// 검색 방법 (hybrid, semantic, keyword, fallback)
        #[arg(short, long, default_value = "hybrid")]
        method: SearchMethod,
    },

    /// 노드 중심 그래프 조회
    Graph {
        /// 노드 ID (슬러그, topic-*, tech-*, venue-*)
        node_id: String,

        /// 탐색 깊이 (1..=3)
        #[arg(short, long, default_value = "1")]
        depth: usize,
    },

    /// 직전 그래프 세대로 되돌리기
    RollbackGraph,

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.content_dir {
        config.content_dir = dir;
    }

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            server::serve(&config).await
        }
        Commands::Index { force } => cmd_index(&config, force).await,
        Commands::BuildGraph => cmd_build_graph(&config).await,
        Commands::Search {
            query,
            limit,
            object_type,
            method,
        } => cmd_search(&config, &query, limit, object_type, method).await,
        Commands::Graph { node_id, depth } => cmd_graph(&config, &node_id, depth).await,
        Commands::RollbackGraph => cmd_rollback_graph(&config).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 인덱싱 명령어 (index)
///
/// 콘텐츠 해시가 같은 객체는 `--force`가 없으면 건너뜁니다.
/// 카탈로그에서 사라진 객체는 인덱스에서도 지웁니다.
async fn cmd_index(config: &Config, force: bool) -> Result<()> {
    let state = AppState::open(config).await?;
    let retriever = state.tools.retriever();

    if !retriever.semantic_enabled() {
        println!("[!] OPENAI_API_KEY 미설정: 키워드 인덱스만 생성합니다.");
    }

    let mut docs = catalog_documents(retriever.catalog());
    let photos = state.tools.photos().all().await.context("사진 목록 조회 실패")?;
    docs.extend(photos.iter().filter_map(photo_document));

    if docs.is_empty() {
        println!("[!] 인덱싱할 콘텐츠가 없습니다: {}", config.content_dir.display());
        return Ok(());
    }

    println!("[*] 인덱싱 대상: {} 건", docs.len());

    let mut indexed = 0;
    let mut unchanged = 0;
    let mut failed = 0;

    for (i, doc) in docs.iter().enumerate() {
        print!(
            "[{}/{}] [{}] {}... ",
            i + 1,
            docs.len(),
            doc.object_type,
            doc.object_id
        );

        match retriever.index_document(doc, force).await {
            Ok(IndexOutcome::Indexed { chunks, embedded }) => {
                println!("완료 ({} 청크{})", chunks, if embedded { ", 임베딩" } else { "" });
                indexed += 1;
            }
            Ok(IndexOutcome::Unchanged) => {
                println!("변경 없음");
                unchanged += 1;
            }
            Err(e) => {
                println!("실패: {:#}", e);
                failed += 1;
            }
        }
    }

    let removed = retriever
        .prune_missing(&docs)
        .await
        .context("삭제된 콘텐츠 정리 실패")?;
    for (object_type, object_id) in &removed {
        println!("[-] [{}] {} 삭제됨 (콘텐츠 없음)", object_type, object_id);
    }

    println!();
    println!(
        "[OK] 완료: 인덱싱 {}, 변경 없음 {}, 실패 {}, 삭제 {}",
        indexed, unchanged, failed, removed.len()
    );

    Ok(())
}

/// 그래프 빌드 명령어 (build-graph)
async fn cmd_build_graph(config: &Config) -> Result<()> {
    let state = AppState::open(config).await?;

    println!("[*] 그래프 추출 중...");
    let summary = state.tools.graph().rebuild().await.context("그래프 빌드 실패")?;

    println!(
        "[OK] 세대 #{} 게시: 노드 {}, 엣지 {}",
        summary.generation, summary.nodes, summary.edges
    );

    let stats = state.tools.graph().stats().await?;
    for (node_type, count) in &stats.node_types {
        println!("     {:<12} {}", node_type, count);
    }
    for (relation, count) in &stats.relation_types {
        println!("     {:<16} {}", relation, count);
    }

    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(
    config: &Config,
    query: &str,
    limit: usize,
    object_type: Option<ObjectType>,
    method: SearchMethod,
) -> Result<()> {
    let state = AppState::open(config).await?;

    println!("[*] 검색 중: \"{}\" ({})", query, method);

    let request = SearchRequest::new(query)
        .with_type(object_type)
        .with_limit(limit)
        .with_method(method);
    let response = state.tools.retriever().search(&request).await;

    if response.combined.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", response.combined.len());

    for (i, hit) in response.combined.iter().enumerate() {
        let similarity = hit
            .similarity
            .map(|s| format!(" 유사도: {:.3}", s))
            .unwrap_or_default();

        println!(
            "{}. [{:?}] [점수: {:.2}{}] {} {}",
            i + 1,
            hit.source,
            hit.score,
            similarity,
            hit.object_type,
            hit.object_id
        );
        if !hit.metadata.title().is_empty() {
            println!("   제목: {}", hit.metadata.title());
        }
        if !hit.metadata.url().is_empty() {
            println!("   URL: {}", hit.metadata.url());
        }
        println!("   내용: {}", truncate_text(&hit.chunk, 200));
        println!();
    }

    Ok(())
}

/// 그래프 조회 명령어 (graph)
async fn cmd_graph(config: &Config, node_id: &str, depth: usize) -> Result<()> {
    let state = AppState::open(config).await?;
    let graph = state.tools.graph().node_graph_or_build(node_id, depth).await?;

    if graph.nodes.is_empty() {
        println!("[!] 노드를 찾을 수 없습니다: {}", node_id);
        return Ok(());
    }

    println!("[OK] 노드 {}, 엣지 {}\n", graph.nodes.len(), graph.edges.len());

    for node in &graph.nodes {
        println!("  [{}] {} - {}", node.node_type, node.id, truncate_text(&node.label, 60));
    }
    println!();
    for edge in &graph.edges {
        println!(
            "  {} -[{} {:.1}]-> {}",
            edge.source, edge.relation, edge.weight, edge.target
        );
    }

    Ok(())
}

/// 그래프 롤백 명령어 (rollback-graph)
async fn cmd_rollback_graph(config: &Config) -> Result<()> {
    let state = AppState::open(config).await?;
    let generation = state.tools.graph().rollback().await.context("그래프 롤백 실패")?;

    println!("[OK] 현재 그래프 세대: #{}", generation);
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &Config) -> Result<()> {
    println!("folio-graph v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 콘텐츠 디렉토리: {}", config.content_dir.display());

    if config.has_api_key() {
        println!("[OK] OpenAI API 키: 설정됨");
    } else {
        println!("[!] OpenAI API 키: 미설정 (시맨틱 검색/채팅 비활성)");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }
    if config.admin_secret_key.is_none() {
        println!("[!] ADMIN_SECRET_KEY 미설정 (사진 업로드 비활성)");
    }

    let state = match AppState::open(config).await {
        Ok(state) => state,
        Err(e) => {
            println!("[!] 초기화 실패: {:#}", e);
            return Ok(());
        }
    };

    let catalog = state.tools.retriever().catalog();
    println!(
        "[OK] 콘텐츠: 논문 {} 건, 프로젝트 {} 건",
        catalog.publications.len(),
        catalog.projects.len()
    );

    match state.tools.retriever().stats().await {
        Ok(stats) => {
            println!(
                "[OK] 검색 인덱스: 객체 {}, 청크 {} ({}), 벡터 {}",
                stats.object_count,
                stats.chunk_count,
                format_bytes(stats.total_chunk_bytes),
                stats.vector_count
            );
        }
        Err(e) => println!("[!] 인덱스 통계 조회 실패: {:#}", e),
    }

    match state.tools.graph().generations().await {
        Ok(generations) if generations.is_empty() => println!("[!] 그래프: 게시된 세대 없음"),
        Ok(generations) => {
            for generation in generations {
                println!(
                    "[OK] 그래프 세대 #{}{}: 노드 {}, 엣지 {} ({})",
                    generation.id,
                    if generation.current { " (현재)" } else { "" },
                    generation.node_count,
                    generation.edge_count,
                    generation.created_at
                );
            }
        }
        Err(e) => println!("[!] 그래프 조회 실패: {:#}", e),
    }

    match state.tools.photos().count().await {
        Ok(count) => println!("[OK] 사진: {} 장", count),
        Err(e) => println!("[!] 사진 조회 실패: {:#}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
