use std::fs;
use std::path::Path;

fn register_dir_files(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() {
                println!("cargo:rerun-if-changed={}", path.display());
            } else if path.is_dir() {
                register_dir_files(&path);
            }
        }
    }
}

fn main() {
    // Migrations are embedded by sqlx::migrate! at compile time
    println!("cargo:rerun-if-changed=migrations");
    register_dir_files(Path::new("migrations"));
}
