use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio_postgres::{Client, NoTls};

use table_importer::{ConnectionConfig, ImportStage, Importer, ImporterError};

/// Live database settings. Tests are skipped unless TEST_POSTGRES_HOST is set.
struct TestConfig {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: String,
}

impl TestConfig {
    fn from_env() -> Option<Self> {
        let host = std::env::var("TEST_POSTGRES_HOST").ok()?;
        Some(Self {
            host,
            port: std::env::var("TEST_POSTGRES_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: std::env::var("TEST_POSTGRES_DB").unwrap_or_else(|_| "importer_test".to_string()),
            user: std::env::var("TEST_POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("TEST_POSTGRES_PASSWORD").unwrap_or_else(|_| "postgres".to_string()),
        })
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(&self.host, &self.database, &self.user, &self.password).with_port(self.port)
    }

    async fn verification_client(&self) -> Result<Client> {
        let (client, connection) = tokio_postgres::Config::new()
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password)
            .connect(NoTls)
            .await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!("Connection error: {}", e);
            }
        });

        Ok(client)
    }
}

/// Fresh product table per test, dropped on cleanup
struct TestTable {
    name: String,
    client: Client,
}

impl TestTable {
    async fn create(config: &TestConfig, name: &str) -> Result<Self> {
        let client = config.verification_client().await?;
        client
            .batch_execute(&format!(
                "DROP TABLE IF EXISTS {name};
                 CREATE TABLE {name} (
                     id INTEGER PRIMARY KEY,
                     name TEXT NOT NULL,
                     price NUMERIC(10, 2) NOT NULL
                 );"
            ))
            .await?;
        Ok(Self {
            name: name.to_string(),
            client,
        })
    }

    async fn count(&self) -> Result<i64> {
        let row = self
            .client
            .query_one(format!("SELECT COUNT(*) FROM {}", self.name).as_str(), &[])
            .await?;
        Ok(row.get(0))
    }

    async fn exists(&self) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name::text = $1)",
                &[&self.name],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn cleanup(self) -> Result<()> {
        self.client
            .batch_execute(&format!("DROP TABLE IF EXISTS {}", self.name))
            .await?;
        Ok(())
    }
}

fn csv_file(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

macro_rules! require_database {
    () => {
        match TestConfig::from_env() {
            Some(config) => config,
            None => {
                println!("Skipping test - TEST_POSTGRES_HOST not set");
                return Ok(());
            }
        }
    };
}

#[tokio::test]
async fn test_import_commits_every_row() -> Result<()> {
    let config = require_database!();
    let table = TestTable::create(&config, "it_products_commit").await?;

    let file = csv_file("id,name,price\n1,Widget,9.99\n2,Gadget,19.50\n3,Sprocket,4.25\n")?;
    let mut importer = Importer::connect(&config.connection_config(), &table.name).await?;
    let report = importer.import(file.path()).await?;

    assert_eq!(report.rows_inserted, 3);
    assert_eq!(table.count().await?, 3);

    let row = table
        .client
        .query_one(
            format!("SELECT name, price::text FROM {} WHERE id = 1", table.name).as_str(),
            &[],
        )
        .await?;
    assert_eq!(row.get::<_, String>(0), "Widget");
    assert_eq!(row.get::<_, String>(1), "9.99");

    table.cleanup().await
}

#[tokio::test]
async fn test_failure_midway_leaves_table_unchanged() -> Result<()> {
    let config = require_database!();
    let table = TestTable::create(&config, "it_products_atomic").await?;
    table
        .client
        .execute(
            format!("INSERT INTO {} (id, name, price) VALUES (100, 'Existing', 1.00)", table.name).as_str(),
            &[],
        )
        .await?;

    // Third row repeats id 1 and violates the primary key.
    let file = csv_file(
        "id,name,price\n1,Widget,9.99\n2,Gadget,19.50\n1,Duplicate,4.25\n4,Flange,7.00\n5,Gizmo,12.75\n",
    )?;
    let mut importer = Importer::connect(&config.connection_config(), &table.name).await?;
    let err = importer.import(file.path()).await.unwrap_err();

    assert_eq!(err.stage(), Some(ImportStage::Execute));
    assert_eq!(table.count().await?, 1);

    // The connection is still usable for the next file.
    let file = csv_file("id,name,price\n7,Bolt,0.10\n")?;
    assert_eq!(importer.import(file.path()).await?.rows_inserted, 1);
    assert_eq!(table.count().await?, 2);

    table.cleanup().await
}

#[tokio::test]
async fn test_injection_payload_stored_as_literal() -> Result<()> {
    let config = require_database!();
    let table = TestTable::create(&config, "it_products_injection").await?;

    let payload = format!("'); DROP TABLE {}; --", table.name);
    let file = csv_file(&format!("id,name,price\n1,\"{}\",1.00\n", payload))?;
    let mut importer = Importer::connect(&config.connection_config(), &table.name).await?;
    importer.import(file.path()).await?;

    assert!(table.exists().await?);
    let row = table
        .client
        .query_one(format!("SELECT name FROM {} WHERE id = 1", table.name).as_str(), &[])
        .await?;
    assert_eq!(row.get::<_, String>(0), payload);

    table.cleanup().await
}

#[tokio::test]
async fn test_unconvertible_value_rolls_back() -> Result<()> {
    let config = require_database!();
    let table = TestTable::create(&config, "it_products_types").await?;

    let file = csv_file("id,name,price\n1,Widget,9.99\n2,Gadget,not-a-number\n")?;
    let mut importer = Importer::connect(&config.connection_config(), &table.name).await?;
    let err = importer.import(file.path()).await.unwrap_err();

    assert!(matches!(err, ImporterError::ImportExecution { .. }));
    assert_eq!(table.count().await?, 0);

    table.cleanup().await
}

#[tokio::test]
async fn test_unknown_table_fails_at_prepare() -> Result<()> {
    let config = require_database!();

    let file = csv_file("id,name\n1,a\n")?;
    let mut importer = Importer::connect(&config.connection_config(), "it_table_that_does_not_exist").await?;
    let err = importer.import(file.path()).await.unwrap_err();

    assert_eq!(err.stage(), Some(ImportStage::Prepare));
    Ok(())
}

#[tokio::test]
async fn test_wrong_password_is_generic() -> Result<()> {
    let config = require_database!();

    let mut connection = config.connection_config();
    connection.password = "definitely-wrong-password".to_string();
    let err = match Importer::connect(&connection, "anything").await {
        Ok(_) => {
            println!("Skipping test - server does not check passwords");
            return Ok(());
        }
        Err(err) => err,
    };

    assert!(matches!(err, ImporterError::Connection));
    assert!(!err.to_string().contains("definitely-wrong-password"));
    Ok(())
}
