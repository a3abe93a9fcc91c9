//! Sample template and sidecar files.
//!
//! The base stack publishes port 3000 and the browser sidecar wants 3000 and
//! 59000, so merging them exercises port reassignment, comment preservation and
//! the shared `volumes` section.

use crate::sidecar::{PortLabel, SidecarDescriptor};

pub const TEMPLATE_ID: &str = "demo-stack";

pub const BROWSER_TEMPLATE_PATH: &str = "sidecars/browser/.template";

pub const BASE_COMPOSE: &str = "\
services:
  devcontainer:
    image: dev/base
    ports:
      - \"3000:3000\"

  # Existing API service should be preserved
  api:
    image: dev/api
    ports:
      - \"4000:4000\"

volumes:
  data: {}
";

pub const BASE_DEVCONTAINER: &str = r#"{
  "name": "Demo",
  "forwardPorts": [
    3000
  ],
  "portsAttributes": {
    "3000": {
      "label": "App",
      "onAutoForward": "openBrowser"
    }
  },
  "containerEnv": {
    "NEXT_DEV_PORT": "3000"
  }
}
"#;

/// Base devcontainer with an inline option and a conditional `image` member.
pub const SECTIONED_DEVCONTAINER: &str = r#"{
  "name": "{{templateOption.projectName}}",
{{#templateOption.usePrebuiltImage}}
  "image": "ghcr.io/example/dev-web:latest",
{{/templateOption.usePrebuiltImage}}
  "forwardPorts": [
    3000
  ],
  "containerEnv": {
    "NEXT_DEV_PORT": "3000"
  }
}
"#;

pub const BROWSER_COMPOSE: &str = "\
services:
  # Browser sidecar comment should survive merge
  browser:
    image: test/browser:latest
    ports:
      - \"3000:3000\"
      - \"59000:59000/tcp\"
    volumes:
      - browser-data:/data

volumes:
  browser-data: {}
";

pub const BROWSER_DEVCONTAINER: &str = r#"{
  "forwardPorts": [
    3000,
    59000
  ],
  "portsAttributes": {
    "3000": {
      "label": "Browser UI",
      "onAutoForward": "openBrowser"
    },
    "59000": {
      "label": "Browser TCP",
      "onAutoForward": "silent"
    }
  },
  "containerEnv": {
    "TEST_BROWSER_PASSWORD": "student"
  },
  "runServices": [
    "browser"
  ]
}
"#;

/// Descriptor matching [`BROWSER_COMPOSE`] and [`BROWSER_DEVCONTAINER`].
#[must_use]
pub fn browser_descriptor() -> SidecarDescriptor {
    SidecarDescriptor::new("test-browser", BROWSER_TEMPLATE_PATH)
        .with_label("Test Browser")
        .with_service_name("browser")
        .with_port(
            3000,
            Some(PortLabel {
                label: "Browser UI".to_string(),
                on_auto_forward: Some("openBrowser".to_string()),
            }),
        )
        .with_port(
            59000,
            Some(PortLabel {
                label: "Browser TCP".to_string(),
                on_auto_forward: Some("silent".to_string()),
            }),
        )
        .with_env("TEST_BROWSER_PASSWORD", "student")
}
