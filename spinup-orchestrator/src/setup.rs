use spinup_common::InstanceTemplate;

use crate::settings::ServerSettings;

fn sh_escape_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

/// Ordered post-boot commands for a fresh instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupPlan {
    commands: Vec<String>,
}

impl SetupPlan {
    /// Container runtime only.
    pub fn base() -> Self {
        Self {
            commands: vec![
                "sudo yum install -y docker".to_string(),
                "sudo service docker start".to_string(),
            ],
        }
    }

    /// Runtime, then the game server when an image is configured. `restore`
    /// is the backup file to unpack into the data dir before the first run.
    pub fn build(
        template: &InstanceTemplate,
        server: &ServerSettings,
        restore: Option<&str>,
        version: Option<&str>,
    ) -> Self {
        let mut plan = Self::base();
        let Some(image) = server.image.as_deref() else {
            return plan;
        };
        let data_dir = sh_escape_single(&server.data_dir);
        plan.commands.push(format!("sudo mkdir -p {}", data_dir));

        if let (Some(file), Some(base_url)) = (restore, server.backup_download_url.as_deref()) {
            let header = server
                .backup_download_auth_header
                .as_deref()
                .map(|h| format!("-H {} ", sh_escape_single(h)))
                .unwrap_or_default();
            plan.commands.push(format!(
                "curl -L {}{} | sudo tar xj -C {}",
                header,
                sh_escape_single(&format!("{}/{}", base_url, file)),
                data_dir
            ));
        }

        let image = match version {
            Some(v) => format!("{}:{}", image, v),
            None => image.to_string(),
        };
        let ports: String = template
            .ingress_ports
            .iter()
            .map(|p| format!("-p {p}:{p}/{} ", template.ingress_protocol))
            .collect();
        plan.commands.push(format!(
            "sudo docker run -d --name {} --restart unless-stopped --pull always {}-v {}:/factorio {}",
            sh_escape_single(&server.container_name),
            ports,
            data_dir,
            sh_escape_single(&image)
        ));
        plan
    }

    /// Archives the data dir into `file` and uploads it to `destination`
    /// while the container is stopped. The container is started again even
    /// when the upload fails.
    pub fn backup(server: &ServerSettings, file: &str, destination: &str) -> Self {
        let archive = sh_escape_single(&format!("/tmp/{}", file));
        let container = sh_escape_single(&server.container_name);
        let region = server
            .upload_region
            .as_deref()
            .map(|r| format!(" --region {}", sh_escape_single(r)))
            .unwrap_or_default();
        Self {
            commands: vec![
                format!("sudo docker stop {}", container),
                format!(
                    "sudo tar cjf {archive} -C {} . && aws s3 cp {archive} {}{} && sudo rm -f {archive}",
                    sh_escape_single(&server.data_dir),
                    sh_escape_single(destination),
                    region,
                ),
                format!("sudo docker start {}", container),
            ],
        }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}
