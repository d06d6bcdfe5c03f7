//! Test utilities for database and pipeline testing.
//!
//! This module provides in-memory SQLite databases with migrations applied,
//! fixture rows, generated workbooks and a pipeline context wired to a
//! temporary upload directory.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use rosters::audit::{AuditEvent, AuditSink};
use rosters::config::AppConfig;
use rosters::models::{company, user, user::Role};
use rosters::pipelines::PipelineContext;
use rosters::storage::LocalBlobStore;
use rosters::tenancy::Actor;
use rust_xlsxwriter::Workbook;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set, Statement};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;

    Migrator::up(&db, None).await?;

    // Fixtures reference users and companies only where a test needs them.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(db)
}

pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

pub async fn insert_company(db: &DatabaseConnection, name: &str) -> Result<Uuid> {
    let company = company::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await?;
    Ok(company.id)
}

pub async fn insert_user(
    db: &DatabaseConnection,
    email: &str,
    role: Role,
    company_id: Option<Uuid>,
) -> Result<user::Model> {
    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        hashed_password: Set("not-a-real-hash".to_string()),
        role: Set(role),
        is_active: Set(true),
        company_id: Set(company_id),
        card_full_name: Set(None),
        card_email: Set(None),
        card_mobile_phone: Set(None),
        card_job_title: Set(None),
        card_office_phone: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await?;
    Ok(user)
}

pub fn actor(role: Role, company_id: Option<Uuid>) -> Actor {
    Actor::new(Uuid::new_v4(), role, company_id)
}

/// Audit sink that keeps every event in memory
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(event);
    }
}

/// Pipeline context over `db` storing uploads under `upload_dir`
pub fn pipeline_context(
    db: Arc<DatabaseConnection>,
    upload_dir: &Path,
    configure: impl FnOnce(&mut AppConfig),
) -> (PipelineContext, Arc<RecordingAuditSink>) {
    let mut config = AppConfig {
        upload_dir: upload_dir.to_path_buf(),
        ..AppConfig::default()
    };
    configure(&mut config);

    let audit = Arc::new(RecordingAuditSink::default());
    let blobs = Arc::new(LocalBlobStore::new(
        config.upload_dir.clone(),
        config.ingest.upload_chunk_bytes,
    ));
    let ctx = PipelineContext::new(&config, db, blobs, audit.clone());
    (ctx, audit)
}

/// `.xlsx` bytes with one worksheet holding `rows`; empty strings leave the cell blank
pub fn workbook_bytes<S: AsRef<str>>(rows: &[Vec<S>]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (row_index, row) in rows.iter().enumerate() {
        for (col_index, value) in row.iter().enumerate() {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            worksheet.write_string(row_index as u32, col_index as u16, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// [`workbook_bytes`] with the sheet XML cut off inside sheet row `break_at` (1-based)
pub fn broken_workbook_bytes<S: AsRef<str>>(rows: &[Vec<S>], break_at: usize) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(workbook_bytes(rows)?))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;

        if name == "xl/worksheets/sheet1.xml" {
            let xml = String::from_utf8(contents)?;
            let marker = format!("<row r=\"{break_at}\"");
            let cut = xml
                .find(&marker)
                .ok_or_else(|| anyhow::anyhow!("sheet has no row {break_at}"))?;
            contents = format!(
                "{}<row r=\"{break_at}\"><c r=\"A{break_at}\" t=\"inlineStr\"><is><t>broken</x>",
                &xml[..cut]
            )
            .into_bytes();
        }

        writer.start_file(name, SimpleFileOptions::default())?;
        writer.write_all(&contents)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Header plus `count` valid roster rows
pub fn roster_rows(count: usize) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Nombre".to_string(),
        "Correo Electrónico".to_string(),
        "Puesto".to_string(),
        "Celular".to_string(),
    ]];
    rows.extend((1..=count).map(|n| {
        vec![
            format!("Employee {n}"),
            format!("employee{n}@example.com"),
            "Analyst".to_string(),
            format!("555-{n:04}"),
        ]
    }));
    rows
}
