use chrono::NaiveDate;
use ledgercal_core::{Company, CompanyDirectory, StoreResult};
use rusqlite::params;

use crate::SqliteStore;
use crate::error::SqlResultExt;

impl SqliteStore {
    /// Adds a company with a database-assigned id.
    pub fn insert_company(
        &self,
        name: &str,
        registration_date: Option<NaiveDate>,
    ) -> StoreResult<Company> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO companies (name, registration_date) VALUES (?1, ?2)",
            params![name, registration_date],
        )
        .store_err()?;
        Ok(Company::new(conn.last_insert_rowid(), name, registration_date))
    }

    /// Inserts or replaces the company with `company.id`.
    pub fn upsert_company(&self, company: &Company) -> StoreResult<()> {
        self.conn()?
            .execute(
                "INSERT INTO companies (id, name, registration_date) VALUES (?1, ?2, ?3) \
                 ON CONFLICT (id) DO UPDATE SET \
                 name = excluded.name, registration_date = excluded.registration_date",
                params![company.id, company.name, company.registration_date],
            )
            .store_err()?;
        Ok(())
    }
}

impl CompanyDirectory for SqliteStore {
    fn list_companies(&self) -> StoreResult<Vec<Company>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, registration_date FROM companies ORDER BY id")
            .store_err()?;
        stmt.query_map([], |row| {
            Ok(Company::new(row.get(0)?, row.get::<_, String>(1)?, row.get(2)?))
        })
        .store_err()?
        .collect::<Result<Vec<_>, _>>()
        .store_err()
    }
}
