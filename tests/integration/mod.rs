mod cache_store;
mod finmind_pipeline;
