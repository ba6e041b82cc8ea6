//! Modbus批量读取功能示例
//! 
//! 展示如何基于配置文件实现批量读取

use std::sync::Arc;
use std::collections::HashMap;
use async_trait::async_trait;
use tokio::time::{interval, Duration};

use crate::core::protocols::common::combase::{
    polling::{PollingEngine, PollingConfig, PollingPoint, PointReader},
    UniversalPollingEngine,
    PointData,
};
use crate::utils::Result;
use super::client::ModbusClient;

/// Modbus点位读取器 - 连接ModbusClient和轮询引擎
pub struct ModbusPointReader {
    client: Arc<ModbusClient>,
}

impl ModbusPointReader {
    pub fn new(client: Arc<ModbusClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PointReader for ModbusPointReader {
    async fn read_point(&self, point_id: u32) -> Result<PointData> {
        // 委托给ModbusClient的read_point方法
        self.client.read_point(point_id).await
    }

    async fn read_points_batch(&self, point_ids: &[u32]) -> Result<Vec<PointData>> {
        // 委托给ModbusClient的批量读取方法
        self.client.read_points_batch(point_ids).await
    }
}

/// 扩展的轮询配置，包含批量读取优化参数
#[derive(Debug, Clone)]
pub struct ModbusPollingConfig {
    /// 基础轮询配置
    pub base_config: PollingConfig,
    /// 是否按地址连续性优化批量读取
    pub optimize_by_address: bool,
    /// 最大合并地址范围
    pub max_address_gap: u16,
    /// 按从站ID分组
    pub group_by_slave: bool,
}

impl Default for ModbusPollingConfig {
    fn default() -> Self {
        Self {
            base_config: PollingConfig {
                enabled: true,
                interval_ms: 1000,  // 1秒轮询
                max_points_per_cycle: 100,
                enable_batch_reading: true,
                point_read_delay_ms: 10,
            },
            optimize_by_address: true,
            max_address_gap: 10,  // 地址间隔小于10则合并
            group_by_slave: true,
        }
    }
}

/// 创建并启动基于配置的批量轮询
pub async fn start_modbus_polling(
    client: Arc<ModbusClient>,
    config: ModbusPollingConfig,
) -> Result<Arc<UniversalPollingEngine>> {
    // 创建点位读取器
    let reader = Arc::new(ModbusPointReader::new(client.clone()));
    
    // 从配置文件加载轮询点位
    let polling_points = load_polling_points_from_config(&client).await?;
    
    // 创建轮询引擎
    let engine = Arc::new(UniversalPollingEngine::new(
        "modbus_polling".to_string(),
        reader,
    ));
    
    // 启动轮询
    engine.start_polling(config.base_config, polling_points).await?;
    
    Ok(engine)
}

/// 从配置加载轮询点位
async fn load_polling_points_from_config(
    client: &Arc<ModbusClient>
) -> Result<Vec<PollingPoint>> {
    let mut polling_points = Vec::new();
    
    // 获取所有配置的映射
    let mappings = client.get_all_mappings().await;
    
    // 遥测点 - 需要定期轮询
    for (point_id, mapping) in &mappings.telemetry_mappings {
        polling_points.push(PollingPoint {
            point_id: *point_id,
            group: format!("slave_{}", mapping.slave_id),  // 按从站分组
            priority: 1,
            custom_interval_ms: None,  // 使用默认间隔
        });
    }
    
    // 遥信点 - 需要定期轮询
    for (point_id, mapping) in &mappings.signal_mappings {
        polling_points.push(PollingPoint {
            point_id: *point_id,
            group: format!("slave_{}", mapping.slave_id),
            priority: 2,  // 遥信优先级稍低
            custom_interval_ms: Some(2000),  // 2秒轮询一次
        });
    }
    
    // 遥调和遥控通常不需要轮询，只在需要时读取
    
    Ok(polling_points)
}

/// 优化的批量读取实现
pub struct OptimizedModbusBatchReader {
    client: Arc<ModbusClient>,
    config: ModbusPollingConfig,
}

impl OptimizedModbusBatchReader {
    pub fn new(client: Arc<ModbusClient>, config: ModbusPollingConfig) -> Self {
        Self { client, config }
    }
    
    /// 根据地址连续性优化批量读取
    pub async fn read_optimized_batch(&self, point_ids: Vec<u32>) -> Result<Vec<PointData>> {
        if !self.config.optimize_by_address {
            // 不优化，直接批量读取
            return self.client.read_points_batch(&point_ids).await;
        }
        
        // 获取所有点位的映射信息
        let mappings = self.client.get_all_mappings().await;
        
        // 按从站ID和地址连续性分组
        let groups = self.group_points_by_continuity(point_ids, &mappings).await?;
        
        // 并发读取各组
        let mut all_results = Vec::new();
        for group in groups {
            match self.read_continuous_registers(group).await {
                Ok(mut results) => all_results.append(&mut results),
                Err(e) => {
                    // 记录错误但继续处理其他组
                    tracing::error!("Failed to read group: {}", e);
                }
            }
        }
        
        Ok(all_results)
    }
    
    /// 按地址连续性分组点位
    async fn group_points_by_continuity(
        &self,
        point_ids: Vec<u32>,
        mappings: &ModbusMappings,
    ) -> Result<Vec<RegisterGroup>> {
        let mut groups = Vec::new();
        let mut slave_groups: HashMap<u8, Vec<(u32, u16)>> = HashMap::new();
        
        // 首先按从站ID分组
        for point_id in point_ids {
            if let Some(mapping) = mappings.telemetry_mappings.get(&point_id) {
                slave_groups
                    .entry(mapping.slave_id)
                    .or_insert_with(Vec::new)
                    .push((point_id, mapping.address));
            }
        }
        
        // 对每个从站的点位按地址排序并分组
        for (slave_id, mut points) in slave_groups {
            points.sort_by_key(|(_, addr)| *addr);
            
            let mut current_group = RegisterGroup {
                slave_id,
                start_address: points[0].1,
                count: 1,
                point_ids: vec![points[0].0],
            };
            
            for i in 1..points.len() {
                let (point_id, address) = points[i];
                let gap = address - (current_group.start_address + current_group.count);
                
                if gap <= self.config.max_address_gap {
                    // 地址连续或间隔小，合并到当前组
                    current_group.count = address - current_group.start_address + 1;
                    current_group.point_ids.push(point_id);
                } else {
                    // 地址间隔大，开始新组
                    groups.push(current_group);
                    current_group = RegisterGroup {
                        slave_id,
                        start_address: address,
                        count: 1,
                        point_ids: vec![point_id],
                    };
                }
            }
            
            groups.push(current_group);
        }
        
        Ok(groups)
    }
    
    /// 读取连续寄存器组
    async fn read_continuous_registers(
        &self,
        group: RegisterGroup,
    ) -> Result<Vec<PointData>> {
        // 使用Modbus的批量读取功能读取连续寄存器
        let response = self.client
            .read_holding_registers(
                group.slave_id,
                group.start_address,
                group.count,
            )
            .await?;
        
        // 将响应数据映射回各个点位
        let mut results = Vec::new();
        // ... 实现数据映射逻辑
        
        Ok(results)
    }
}

/// 寄存器组信息
#[derive(Debug)]
struct RegisterGroup {
    slave_id: u8,
    start_address: u16,
    count: u16,
    point_ids: Vec<u32>,
}

/// 示例：配置文件驱动的批量读取
pub async fn example_config_based_batch_reading() -> Result<()> {
    // 假设已有ModbusClient实例
    let client = Arc::new(create_modbus_client().await?);
    
    // 创建轮询配置
    let config = ModbusPollingConfig {
        base_config: PollingConfig {
            enabled: true,
            interval_ms: 1000,      // 每秒轮询
            max_points_per_cycle: 100,
            enable_batch_reading: true,
            point_read_delay_ms: 0,  // 批量读取不需要延迟
        },
        optimize_by_address: true,
        max_address_gap: 10,
        group_by_slave: true,
    };
    
    // 启动轮询引擎
    let engine = start_modbus_polling(client.clone(), config.clone()).await?;
    
    // 订阅轮询结果
    let mut rx = engine.subscribe_results().await;
    
    // 处理轮询结果
    tokio::spawn(async move {
        while let Some(results) = rx.recv().await {
            for point_data in results {
                println!("Point {}: {} {}", 
                    point_data.id, 
                    point_data.value, 
                    point_data.unit
                );
                
                // 可以将数据写入Redis或其他存储
                // redis_sync.update_point(point_data).await;
            }
        }
    });
    
    // 运行一段时间后停止
    tokio::time::sleep(Duration::from_secs(60)).await;
    engine.stop_polling().await?;
    
    Ok(())
}

/// 示例：手动触发批量读取
pub async fn example_manual_batch_reading() -> Result<()> {
    let client = Arc::new(create_modbus_client().await?);
    
    // 从配置文件获取所有遥测点ID
    let mappings = client.get_all_mappings().await;
    let telemetry_ids: Vec<u32> = mappings.telemetry_mappings.keys().copied().collect();
    
    // 批量读取所有遥测点
    let results = client.read_points_batch(&telemetry_ids).await?;
    
    println!("批量读取 {} 个点位成功", results.len());
    for data in results {
        println!("{}: {} {}", data.name, data.value, data.unit);
    }
    
    Ok(())
}

// 辅助函数
async fn create_modbus_client() -> Result<ModbusClient> {
    // 实际实现中从配置创建客户端
    todo!()
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[tokio::test]
    async fn test_batch_reading_grouping() {
        // 测试地址连续性分组逻辑
        let config = ModbusPollingConfig::default();
        let reader = OptimizedModbusBatchReader {
            client: Arc::new(create_test_client()),
            config,
        };
        
        // 测试数据：
        // 地址 40001, 40002, 40003 应该合并为一组
        // 地址 40020, 40021 应该是另一组
        // 地址 40100 应该是单独一组
        
        // ... 测试实现
    }
}