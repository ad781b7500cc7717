use anyhow::Result;
use erdb::DbConnection;

use super::write_line;

pub fn run(db: &DbConnection) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for name in db.table_names()? {
        if !write_line(&mut stdout, &name)? {
            break;
        }
    }
    Ok(())
}
