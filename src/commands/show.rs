use anyhow::Result;

use crate::{package::InstalledPackage, runtime::Runtime, session::Session};

/// Show the installed record of one package
#[tracing::instrument(skip(session))]
pub async fn show<R: Runtime>(session: &Session<R>, name: &str) -> Result<()> {
    if let Some(package) = session.find_installed(name).await {
        print!("{}", format_package(&package));
    }
    Ok(())
}

fn format_package(package: &InstalledPackage) -> String {
    let mut out = format!(
        "Name: {}\nVersion: {}\nLocation: {}\n",
        package.name,
        package.version,
        package.location.display()
    );
    if let Some(installer) = &package.installer {
        out.push_str(&format!("Installer: {}\n", installer));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_package() {
        let package = InstalledPackage {
            name: "requests".into(),
            version: "2.31.0".into(),
            location: PathBuf::from("/venv/site-packages"),
            installer: Some("pip".into()),
        };
        assert_eq!(
            format_package(&package),
            "Name: requests\nVersion: 2.31.0\nLocation: /venv/site-packages\nInstaller: pip\n"
        );
    }

    #[test]
    fn test_format_package_without_installer() {
        let package = InstalledPackage {
            name: "six".into(),
            version: "1.16.0".into(),
            location: PathBuf::from("/venv/site-packages"),
            installer: None,
        };
        assert!(!format_package(&package).contains("Installer"));
    }
}
