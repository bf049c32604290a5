mod server;
mod subscription;
