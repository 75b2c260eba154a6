//! HTTP服务器设置模块
//! 负责绑定监听地址、挂载路由以及优雅关闭

use crate::api::routes;
use crate::util::config::ServerConfig;
use crate::AppState;
use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::{info, warn};

/// HTTP服务器管理器
pub struct ServerManager;

impl ServerManager {
    /// 创建HTTP服务器
    pub async fn create_server(config: &ServerConfig, app_state: AppState) -> Result<HttpServer> {
        info!(
            target: "server.http",
            event = "http.server.create",
            "创建HTTP服务器"
        );

        let listener = Self::bind_listener(&config.host, config.port).await?;
        let local_addr = listener.local_addr()?;

        info!(
            target: "server.http",
            event = "http.router.build"
        );
        let app_routes = routes(app_state);

        info!(
            target: "server.http",
            event = "http.server.ready",
            address = %local_addr
        );

        Ok(HttpServer {
            listener,
            app_routes,
            local_addr,
        })
    }

    /// 绑定监听端口
    async fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
        info!(
            target: "server.http",
            event = "http.server.bind_start",
            host = %host,
            port
        );

        // 通配地址优先尝试IPv6双栈，失败再降级IPv4
        if host == "0.0.0.0" {
            let v6_addr = format!("[::]:{}", port);
            match TcpListener::bind(&v6_addr).await {
                Ok(listener) => {
                    info!(
                        target: "server.http",
                        event = "http.server.bound",
                        protocol = "ipv6",
                        address = %v6_addr
                    );
                    return Ok(listener);
                }
                Err(e6) => warn!("IPv6绑定失败: {}，尝试IPv4", e6),
            }
        }

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("地址 {} 绑定失败: {}", addr, e))?;
        info!(
            target: "server.http",
            event = "http.server.bound",
            address = %addr
        );
        Ok(listener)
    }

    /// 启动服务器
    pub async fn start_server(server: HttpServer) -> Result<()> {
        info!(
            target: "server.http",
            event = "http.server.start",
            address = %server.local_addr
        );

        axum::serve(server.listener, server.app_routes)
            .with_graceful_shutdown(Self::shutdown_signal())
            .await?;

        info!("HTTP服务器已关闭");
        Ok(())
    }

    /// 优雅关闭信号处理
    async fn shutdown_signal() {
        tokio::select! {
            _ = ctrl_c() => {
                info!(
                    target: "server.http",
                    event = "http.server.signal",
                    signal = "SIGINT"
                );
            }
            _ = Self::wait_for_sigterm() => {
                info!(
                    target: "server.http",
                    event = "http.server.signal",
                    signal = "SIGTERM"
                );
            }
        }

        info!(
            target: "server.http",
            event = "http.server.shutdown_begin"
        );
    }

    /// 等待 SIGTERM 信号
    async fn wait_for_sigterm() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term_signal) => {
                    term_signal.recv().await;
                }
                Err(e) => {
                    warn!("无法监听SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
        }
    }
}

/// HTTP服务器实例
pub struct HttpServer {
    listener: TcpListener,
    app_routes: Router,
    local_addr: std::net::SocketAddr,
}

impl HttpServer {
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }
}
